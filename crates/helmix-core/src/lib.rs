//! helmix Core - Core types for simple Kubernetes templating
//!
//! This crate provides the foundational types used throughout helmix:
//! - `Project`: The `helmix.yaml` descriptor and its environments
//! - `Values`: Configuration values with deep merge support
//! - `ValuesLoader`: Ordered resolution and loading of values sources
//! - `Envelope`: GPG decryption and signature checks for values files
//! - `Manifest`: Rendered output parsed back into YAML documents
//! - `Schema`: Values schema validation

pub mod context;
pub mod envelope;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod project;
pub mod schema;
pub mod values;

pub use context::{EnvInfo, ProjectInfo, TemplateContext, TemplateInfo};
pub use envelope::{
    Envelope, EnvelopeError, Keyring, NoKeyring, SignaturePolicy, SignatureStatus,
    VerifiedPlaintext, is_valid_trusted_key,
};
pub use error::{CoreError, ValidationErrorInfo};
pub use loader::{LoadedSource, LoadedValues, SourceKind, ValuesLoader, ValuesSource};
pub use manifest::{Manifest, ManifestError, ManifestIssue};
pub use project::{Environment, LoadedProject, Project};
pub use schema::{Schema, SchemaValidator, ValidationResult};
pub use values::{Values, parse_set_values};

#[cfg(feature = "gpg")]
pub use envelope::gpg::GpgKeyring;
