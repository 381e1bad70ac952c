//! Keyring backed by the system `gpg` binary
//!
//! This uses the installed GnuPG, which automatically handles:
//! - the user's keyring in `~/.gnupg` (or `GNUPGHOME` / `--homedir`)
//! - gpg-agent and pinentry for passphrase-protected secret keys
//! - smartcards and hardware tokens configured for the agent

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{EnvelopeError, GpgOutcome, Keyring, parse_status};

/// Keyring that shells out to `gpg --batch --status-fd 2`
#[derive(Debug, Clone)]
pub struct GpgKeyring {
    program: PathBuf,
    homedir: Option<PathBuf>,
}

impl Default for GpgKeyring {
    fn default() -> Self {
        Self::new()
    }
}

impl GpgKeyring {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("gpg"),
            homedir: None,
        }
    }

    /// Use an alternative GnuPG home directory
    pub fn with_homedir(mut self, homedir: Option<PathBuf>) -> Self {
        self.homedir = homedir;
        self
    }

    /// Use a different gpg executable (e.g. `gpg2`)
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--batch", "--no-tty", "--status-fd", "2"]);
        if let Some(homedir) = &self.homedir {
            cmd.arg("--homedir").arg(homedir);
        }
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<GpgOutcome, EnvelopeError> {
        tracing::debug!(command = ?cmd, "running gpg");

        let output = cmd.output().map_err(|e| EnvelopeError::GpgUnavailable {
            message: format!("failed to run {}: {}", self.program.display(), e),
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let status = parse_status(&stderr);

        // gpg exits non-zero for bad signatures and failed decryption too;
        // the status lines carry the precise reason, so only bail out here
        // when gpg said nothing we can act on.
        if !output.status.success() && status.is_unsigned() && !status.decryption_failed {
            let human: Vec<&str> = stderr
                .lines()
                .filter(|line| !line.starts_with("[GNUPG:]"))
                .collect();
            return Err(EnvelopeError::GpgFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: human.join("\n"),
            });
        }

        Ok(GpgOutcome {
            plaintext: output.stdout,
            status,
        })
    }
}

impl Keyring for GpgKeyring {
    fn decrypt(&self, path: &Path) -> Result<GpgOutcome, EnvelopeError> {
        let mut cmd = self.command();
        cmd.arg("--decrypt").arg(path);
        self.run(cmd)
    }

    fn verify_detached(&self, data: &Path, signature: &Path) -> Result<GpgOutcome, EnvelopeError> {
        let mut cmd = self.command();
        cmd.arg("--verify").arg(signature).arg(data);
        self.run(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_unavailable() {
        let keyring = GpgKeyring::new().with_program("/nonexistent/helmix-test-gpg");
        let err = keyring.decrypt(Path::new("secrets.yaml.gpg")).unwrap_err();
        assert!(matches!(err, EnvelopeError::GpgUnavailable { .. }));
    }

    #[test]
    fn test_command_includes_homedir() {
        let keyring = GpgKeyring::new().with_homedir(Some(PathBuf::from("/tmp/keys")));
        let cmd = keyring.command();
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec!["--batch", "--no-tty", "--status-fd", "2", "--homedir", "/tmp/keys"]
        );
    }
}
