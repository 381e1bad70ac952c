//! CLI commands

pub mod diff;
pub mod init;
pub mod lint;
pub mod render;
pub mod show;
pub mod validate;
pub mod values;

#[cfg(feature = "gpg")]
pub mod verify;
