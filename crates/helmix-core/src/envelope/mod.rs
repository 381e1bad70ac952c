//! GPG envelopes around values files
//!
//! A values file may be encrypted (`*.gpg`, `*.asc`) and/or carry a
//! detached signature (`<file>.sig`, or `<file>.asc` for plain files).
//! [`Envelope::open`] decrypts and verifies such a file before the loader
//! merges it, and enforces the project's signature policy.
//!
//! The actual cryptography sits behind the [`Keyring`] trait. With the
//! `gpg` feature enabled, [`gpg::GpgKeyring`] drives the system `gpg`
//! binary; without it, [`NoKeyring`] rejects every protected file.

pub mod status;

#[cfg(feature = "gpg")]
pub mod gpg;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use status::{StatusReport, ValidSig, normalize_fingerprint, parse_status};

/// Errors raised while opening a protected values file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("bad signature from key {key_id}")]
    BadSignature { key_id: String },

    #[error("signed by untrusted key {fingerprint}")]
    UntrustedKey { fingerprint: String },

    #[error("signature required but none found")]
    MissingSignature,

    #[error("no public key {key_id} in keyring to check the signature")]
    NoPublicKey { key_id: String },

    #[error("signing key {key_id} has expired")]
    ExpiredKey { key_id: String },

    #[error("signing key {key_id} has been revoked")]
    RevokedKey { key_id: String },

    #[error("signature could not be checked (key {key_id})")]
    UncheckableSignature { key_id: String },

    #[error("decryption failed: {message}")]
    DecryptionFailed { message: String },

    #[error("gpg is not available: {message}")]
    GpgUnavailable { message: String },

    #[error("gpg exited with status {status}: {stderr}")]
    GpgFailed { status: i32, stderr: String },

    #[error("file is GPG-protected but helmix was built without gpg support (rebuild with `--features gpg`)")]
    Unsupported,

    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8,

    #[error("failed to read file: {message}")]
    Io { message: String },
}

/// What the keyring reports back after decrypting or verifying
#[derive(Debug, Clone, Default)]
pub struct GpgOutcome {
    /// Decrypted bytes (empty for detached verification)
    pub plaintext: Vec<u8>,

    /// Parsed status lines
    pub status: StatusReport,
}

/// Cryptographic backend used by [`Envelope`]
pub trait Keyring {
    /// Decrypt an encrypted file, verifying any inline signature
    fn decrypt(&self, path: &Path) -> Result<GpgOutcome, EnvelopeError>;

    /// Check a detached signature over `data`
    fn verify_detached(&self, data: &Path, signature: &Path) -> Result<GpgOutcome, EnvelopeError>;
}

/// Keyring used when helmix is built without the `gpg` feature
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeyring;

impl Keyring for NoKeyring {
    fn decrypt(&self, _path: &Path) -> Result<GpgOutcome, EnvelopeError> {
        Err(EnvelopeError::Unsupported)
    }

    fn verify_detached(&self, _data: &Path, _signature: &Path) -> Result<GpgOutcome, EnvelopeError> {
        Err(EnvelopeError::Unsupported)
    }
}

/// Signature state of an opened values file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// No signature present (allowed unless signatures are required)
    Unsigned,
    /// Good signature from a trusted key
    Good {
        fingerprint: String,
        signer: String,
    },
}

/// Plaintext of a values file after the envelope was opened
#[derive(Debug, Clone)]
pub struct VerifiedPlaintext {
    pub content: String,
    pub signature: SignatureStatus,
    pub decrypted: bool,
}

/// Signature policy applied to every values file
#[derive(Debug, Clone, Default)]
pub struct SignaturePolicy {
    /// Reject files without a valid signature
    pub require_signatures: bool,

    /// Accepted signer fingerprints; empty accepts any key gpg trusts
    pub trusted_keys: Vec<String>,
}

impl SignaturePolicy {
    fn is_trusted(&self, valid: &ValidSig) -> bool {
        if self.trusted_keys.is_empty() {
            return true;
        }
        let fpr = normalize_fingerprint(&valid.fingerprint);
        let primary = valid
            .primary_fingerprint
            .as_deref()
            .map(normalize_fingerprint);

        self.trusted_keys.iter().map(|k| normalize_fingerprint(k)).any(|trusted| {
            key_matches(&trusted, &fpr) || primary.as_deref().is_some_and(|p| key_matches(&trusted, p))
        })
    }
}

/// Whether a `trustedKeys` entry is a full fingerprint (40 or 64 hex
/// digits) or a long key id (16 hex digits)
pub fn is_valid_trusted_key(key: &str) -> bool {
    let key = normalize_fingerprint(key);
    matches!(key.len(), LONG_KEY_ID_LEN | 40 | 64) && key.chars().all(|c| c.is_ascii_hexdigit())
}

const LONG_KEY_ID_LEN: usize = 16;

/// Full fingerprints compare exactly, long key ids against the fingerprint tail
fn key_matches(trusted: &str, fingerprint: &str) -> bool {
    if !is_valid_trusted_key(trusted) {
        return false;
    }
    if trusted.len() == LONG_KEY_ID_LEN {
        fingerprint.len() > LONG_KEY_ID_LEN && fingerprint.ends_with(trusted)
    } else {
        fingerprint == trusted
    }
}

/// Whether a path names an encrypted values file
pub fn is_encrypted(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("gpg" | "asc" | "pgp")
    )
}

/// Detached signature next to a plain file, if one exists
pub fn detached_signature(path: &Path) -> Option<PathBuf> {
    if is_encrypted(path) {
        return None;
    }
    ["sig", "asc"]
        .into_iter()
        .map(|ext| {
            let mut name = path.as_os_str().to_owned();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        })
        .find(|candidate| candidate.is_file())
}

/// Opens protected values files with a keyring and a signature policy
pub struct Envelope<'a> {
    keyring: &'a dyn Keyring,
    policy: SignaturePolicy,
}

impl<'a> Envelope<'a> {
    pub fn new(keyring: &'a dyn Keyring, policy: SignaturePolicy) -> Self {
        Self { keyring, policy }
    }

    pub fn policy(&self) -> &SignaturePolicy {
        &self.policy
    }

    /// Read a values file, decrypting and verifying it as needed
    pub fn open(&self, path: &Path) -> Result<VerifiedPlaintext, EnvelopeError> {
        if is_encrypted(path) {
            tracing::debug!(path = %path.display(), "decrypting values file");
            let outcome = self.keyring.decrypt(path)?;
            if outcome.status.decryption_failed || !outcome.status.decryption_okay {
                return Err(EnvelopeError::DecryptionFailed {
                    message: format!("no usable secret key for {}", path.display()),
                });
            }
            let signature = self.check_signature(&outcome.status, false)?;
            let content =
                String::from_utf8(outcome.plaintext).map_err(|_| EnvelopeError::InvalidUtf8)?;
            return Ok(VerifiedPlaintext {
                content,
                signature,
                decrypted: true,
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| EnvelopeError::Io {
            message: e.to_string(),
        })?;

        let signature = match detached_signature(path) {
            Some(sig) => {
                tracing::debug!(path = %path.display(), signature = %sig.display(), "verifying detached signature");
                let outcome = self.keyring.verify_detached(path, &sig)?;
                self.check_signature(&outcome.status, true)?
            }
            None if self.policy.require_signatures => return Err(EnvelopeError::MissingSignature),
            None => SignatureStatus::Unsigned,
        };

        Ok(VerifiedPlaintext {
            content,
            signature,
            decrypted: false,
        })
    }

    /// Turn a status report into a decision
    ///
    /// `expect_signature` is set for detached signatures, where silence
    /// from gpg means the signature did not verify.
    fn check_signature(
        &self,
        status: &StatusReport,
        expect_signature: bool,
    ) -> Result<SignatureStatus, EnvelopeError> {
        if let Some(key_id) = &status.bad_sig {
            return Err(EnvelopeError::BadSignature {
                key_id: key_id.clone(),
            });
        }
        if let Some(key_id) = &status.expired_key {
            return Err(EnvelopeError::ExpiredKey {
                key_id: key_id.clone(),
            });
        }
        if let Some(key_id) = &status.revoked_key {
            return Err(EnvelopeError::RevokedKey {
                key_id: key_id.clone(),
            });
        }
        if let Some(key_id) = &status.no_pubkey {
            return Err(EnvelopeError::NoPublicKey {
                key_id: key_id.clone(),
            });
        }
        if let Some(key_id) = &status.err_sig {
            return Err(EnvelopeError::UncheckableSignature {
                key_id: key_id.clone(),
            });
        }

        match (&status.good_sig, &status.valid_sig) {
            (Some((_, signer)), Some(valid)) => {
                if !self.policy.is_trusted(valid) {
                    return Err(EnvelopeError::UntrustedKey {
                        fingerprint: normalize_fingerprint(&valid.fingerprint),
                    });
                }
                Ok(SignatureStatus::Good {
                    fingerprint: normalize_fingerprint(&valid.fingerprint),
                    signer: signer.clone(),
                })
            }
            (Some((key_id, _)), None) => Err(EnvelopeError::UncheckableSignature {
                key_id: key_id.clone(),
            }),
            _ if expect_signature || self.policy.require_signatures => {
                Err(EnvelopeError::MissingSignature)
            }
            _ => Ok(SignatureStatus::Unsigned),
        }
    }
}
