//! helmix engine - MiniJinja rendering for Kubernetes manifests
//!
//! This crate provides:
//! - Filters and functions for writing manifests (toyaml, b64encode, dig, ...)
//! - Project rendering with partials and `NOTES.txt`
//! - Human-readable error messages with suggestions
//! - Multi-error collection for linting

pub mod engine;
pub mod error;
pub mod filters;
pub mod functions;
pub mod suggestions;

pub use engine::{Engine, EngineBuilder, RenderResult};
pub use error::{
    EngineError, RenderReport, RenderResultWithReport, TemplateError, TemplateErrorKind,
};
pub use suggestions::{AVAILABLE_FILTERS, AVAILABLE_FUNCTIONS};
