//! GnuPG machine-readable status parsing (`--status-fd`)
//!
//! Only the keywords that decide whether a values file may be used are
//! recognised; everything else is ignored.

/// Prefix of every status line
const STATUS_PREFIX: &str = "[GNUPG:] ";

/// Facts extracted from a gpg status stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// `GOODSIG <keyid> <user id>`
    pub good_sig: Option<(String, String)>,
    /// `BADSIG <keyid> ...`
    pub bad_sig: Option<String>,
    /// `EXPKEYSIG <keyid> ...`
    pub expired_key: Option<String>,
    /// `REVKEYSIG <keyid> ...`
    pub revoked_key: Option<String>,
    /// `ERRSIG <keyid> ...`
    pub err_sig: Option<String>,
    /// `NO_PUBKEY <keyid>`
    pub no_pubkey: Option<String>,
    /// `VALIDSIG <fpr> ... [<primary fpr>]`
    pub valid_sig: Option<ValidSig>,
    /// `DECRYPTION_OKAY`
    pub decryption_okay: bool,
    /// `DECRYPTION_FAILED`, `NO_SECKEY` or `NODATA`
    pub decryption_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSig {
    pub fingerprint: String,
    pub primary_fingerprint: Option<String>,
}

impl StatusReport {
    /// True when no signature-related keyword was seen
    pub fn is_unsigned(&self) -> bool {
        self.good_sig.is_none()
            && self.bad_sig.is_none()
            && self.expired_key.is_none()
            && self.revoked_key.is_none()
            && self.err_sig.is_none()
            && self.valid_sig.is_none()
    }
}

/// Parse the status lines written by `gpg --status-fd`
///
/// Non-status lines (human-readable messages interleaved on the same
/// descriptor) are skipped.
pub fn parse_status(output: &str) -> StatusReport {
    let mut report = StatusReport::default();

    for line in output.lines() {
        let Some(rest) = line.trim_end().strip_prefix(STATUS_PREFIX) else {
            continue;
        };
        let mut fields = rest.split(' ');
        let keyword = fields.next().unwrap_or_default();
        let args: Vec<&str> = fields.collect();
        let first = args.first().map(|s| s.to_string()).unwrap_or_default();

        match keyword {
            "GOODSIG" => {
                let user = args.get(1..).map(|u| u.join(" ")).unwrap_or_default();
                report.good_sig = Some((first, user));
            }
            "BADSIG" => report.bad_sig = Some(first),
            "EXPKEYSIG" => report.expired_key = Some(first),
            "REVKEYSIG" => report.revoked_key = Some(first),
            "ERRSIG" => report.err_sig = Some(first),
            "NO_PUBKEY" => report.no_pubkey = Some(first),
            "VALIDSIG" => {
                report.valid_sig = Some(ValidSig {
                    fingerprint: first,
                    primary_fingerprint: args.get(9).map(|s| s.to_string()),
                });
            }
            "DECRYPTION_OKAY" => report.decryption_okay = true,
            "DECRYPTION_FAILED" | "NO_SECKEY" | "NODATA" => report.decryption_failed = true,
            _ => {}
        }
    }

    report
}

/// Normalise a fingerprint for comparison: uppercase, no spaces, no `0x`
pub fn normalize_fingerprint(fpr: &str) -> String {
    let fpr: String = fpr.chars().filter(|c| !c.is_whitespace()).collect();
    let fpr = fpr
        .strip_prefix("0x")
        .or_else(|| fpr.strip_prefix("0X"))
        .unwrap_or(&fpr);
    fpr.to_uppercase()
}
