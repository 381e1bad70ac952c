//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - values do not match the schema
pub const VALIDATION_ERROR: i32 = 2;

/// Template error - template rendering failed
pub const TEMPLATE_ERROR: i32 = 3;

/// Load error - invalid helmix.yaml, missing or malformed values file
pub const LOAD_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Verification error - bad or missing GPG signature, decryption failure
pub const VERIFICATION_ERROR: i32 = 6;

/// Manifest error - rendered output is not valid YAML, or lint found problems
pub const MANIFEST_ERROR: i32 = 7;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
