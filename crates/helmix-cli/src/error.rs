//! CLI error types with exit code handling
//!
//! Every library error is mapped onto a [`CliError`] variant, and every
//! variant onto one of the codes in [`crate::exit_codes`].

use helmix_core::{CoreError, ManifestError};
use helmix_engine::{EngineError, TemplateError};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Values failed schema validation
    #[error("Validation failed: {message}")]
    #[diagnostic(code(helmix::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A single template failed to render
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(TemplateError),

    /// Project descriptor or values could not be loaded
    #[error("{message}")]
    #[diagnostic(code(helmix::cli::load))]
    Load {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A protected values file failed decryption or signature checks
    #[error("Verification failed: {message}")]
    #[diagnostic(code(helmix::cli::verification))]
    Verification {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Rendered output is not valid YAML
    #[error("{message}")]
    #[diagnostic(code(helmix::cli::manifest))]
    InvalidManifest { message: String },

    /// Linting failed with errors
    #[error("Linting failed with {errors} error(s) and {warnings} warning(s)")]
    #[diagnostic(code(helmix::cli::lint))]
    LintFailed { errors: usize, warnings: usize },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(helmix::cli::io))]
    Io { message: String },

    /// Anything else
    #[error("{message}")]
    #[diagnostic(code(helmix::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Template(_) => exit_codes::TEMPLATE_ERROR,
            CliError::Load { .. } => exit_codes::LOAD_ERROR,
            CliError::Verification { .. } => exit_codes::VERIFICATION_ERROR,
            CliError::InvalidManifest { .. } | CliError::LintFailed { .. } => {
                exit_codes::MANIFEST_ERROR
            }
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Whether the failure was already printed in detail by the command
    pub fn is_reported(&self) -> bool {
        matches!(self, CliError::LintFailed { .. })
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a load error
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
            help: None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Create a lint failure error
    pub fn lint_failed(errors: usize, warnings: usize) -> Self {
        Self::LintFailed { errors, warnings }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Envelope { .. } => CliError::Verification {
                help: Some(
                    "Run `helmix verify <file>` to inspect the signature, or check `gpg.trustedKeys` in helmix.yaml"
                        .to_string(),
                ),
                message: err.to_string(),
            },
            CoreError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            CoreError::UnknownEnvironment { .. } => CliError::Load {
                help: Some("Pick one of the environments declared in helmix.yaml".to_string()),
                message: err.to_string(),
            },
            CoreError::ProjectNotFound { .. } => CliError::Load {
                help: Some("Create a project with `helmix init <name>`".to_string()),
                message: err.to_string(),
            },
            other => CliError::load(other.to_string()),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Template(te) => CliError::Template(te),
            EngineError::Manifest(me) => CliError::from(me),
            EngineError::Project(ce) => CliError::from(ce),
            EngineError::Io(e) => CliError::from(e),
        }
    }
}

impl From<ManifestError> for CliError {
    fn from(err: ManifestError) -> Self {
        CliError::InvalidManifest {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use helmix_core::EnvelopeError;

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let verification = CliError::from(CoreError::Envelope {
            path: "values/prod.secrets.yaml.gpg".to_string(),
            source: EnvelopeError::MissingSignature,
        });
        assert_eq!(verification.exit_code(), exit_codes::VERIFICATION_ERROR);

        let load = CliError::from(CoreError::ValuesNotFound {
            path: "values.yaml".to_string(),
        });
        assert_eq!(load.exit_code(), exit_codes::LOAD_ERROR);

        let io = CliError::from(std::io::Error::other("disk full"));
        assert_eq!(io.exit_code(), exit_codes::IO_ERROR);

        let template = CliError::from(EngineError::Template(TemplateError::simple("boom")));
        assert_eq!(template.exit_code(), exit_codes::TEMPLATE_ERROR);

        assert_eq!(CliError::lint_failed(1, 0).exit_code(), exit_codes::MANIFEST_ERROR);
        assert_eq!(
            CliError::validation_with_help("bad", "fix it").exit_code(),
            exit_codes::VALIDATION_ERROR
        );
    }

    #[test]
    fn test_verification_message_names_file() {
        let err = CliError::from(CoreError::Envelope {
            path: "values/prod.yaml".to_string(),
            source: EnvelopeError::UntrustedKey {
                fingerprint: "ABCD".to_string(),
            },
        });
        assert_eq!(
            err.to_string(),
            "Verification failed: values/prod.yaml: signed by untrusted key ABCD"
        );
    }
}
