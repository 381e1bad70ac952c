//! Core error types

use serde::Serialize;
use thiserror::Error;

use crate::envelope::EnvelopeError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Project not found: {path}")]
    ProjectNotFound { path: String },

    #[error("Invalid helmix.yaml: {message}")]
    InvalidProject { message: String },

    #[error("Unknown environment '{name}' (available: {available})")]
    UnknownEnvironment { name: String, available: String },

    #[error("Values file not found: {path}")]
    ValuesNotFound { path: String },

    #[error("Invalid values file {path}: {message}")]
    InvalidValues { path: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Values merge error: {message}")]
    ValuesMerge { message: String },

    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("{path}: {source}")]
    Envelope {
        path: String,
        #[source]
        source: EnvelopeError,
    },
}

impl CoreError {
    /// Whether this error came from signature or decryption checks
    pub fn is_verification(&self) -> bool {
        matches!(self, CoreError::Envelope { .. })
    }
}

/// A single schema violation, addressed by JSON pointer
#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorInfo {
    pub path: String,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, CoreError>;
