//! Fallback decision for the named-pipe transport.
//!
//! After every TCP candidate has failed, the engines ask the classifier
//! whether one extra attempt over a local named pipe is worthwhile. The
//! decision looks only at structured failures (exit code + captured output)
//! and an injectable list of "transport unavailable" signatures.

use serde::{Deserialize, Serialize};

use crate::backup::attempt::AttemptRecord;

/// Signatures the MySQL client tools print when a TCP endpoint is unusable.
pub const DEFAULT_SIGNATURES: &[&str] = &[
    "can't connect to mysql server",
    "can't connect to local mysql server",
    "can't connect to server",
    "unknown mysql server host",
    "connection refused",
    "error 2002",
    "error 2003",
    "2002:",
    "2003:",
    "(10061)",
    "(10060)",
];

/// When the pipe fallback may be used at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Only on platforms with named-pipe servers (Windows).
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallbackClassifier {
    qualifies: bool,
    signatures: Vec<String>,
}

impl FallbackClassifier {
    pub fn new<I, S>(mode: FallbackMode, platform: Platform, signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let qualifies = match mode {
            FallbackMode::Always => true,
            FallbackMode::Never => false,
            FallbackMode::Auto => platform == Platform::Windows,
        };
        Self {
            qualifies,
            signatures: signatures
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn with_default_signatures(mode: FallbackMode, platform: Platform) -> Self {
        Self::new(mode, platform, DEFAULT_SIGNATURES.iter().copied())
    }

    pub fn platform_qualifies(&self) -> bool {
        self.qualifies
    }

    /// True when `attempt` failed in a way that points at the transport.
    ///
    /// Timeouts and failures to start the client never qualify: only a client
    /// that ran and exited non-zero reports why it could not connect.
    pub fn is_transport_unavailable(&self, attempt: &AttemptRecord) -> bool {
        if attempt.timed_out || matches!(attempt.exit_code, None | Some(0)) {
            return false;
        }
        let captured = attempt.captured().to_lowercase();
        self.signatures.iter().any(|sig| captured.contains(sig.as_str()))
    }

    /// Whether the single pipe attempt should be made after `attempts`.
    pub fn should_fall_back(&self, attempts: &[AttemptRecord]) -> bool {
        self.qualifies && attempts.iter().any(|a| self.is_transport_unavailable(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(code: Option<i32>, stderr: &str) -> AttemptRecord {
        AttemptRecord {
            label: "tcp ::1:3306".into(),
            argv: vec!["mysqldump".into()],
            exit_code: code,
            timed_out: false,
            reason: "exited".into(),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_auto_mode_qualifies_only_on_windows() {
        let windows = FallbackClassifier::with_default_signatures(FallbackMode::Auto, Platform::Windows);
        let other = FallbackClassifier::with_default_signatures(FallbackMode::Auto, Platform::Other);
        assert!(windows.platform_qualifies());
        assert!(!other.platform_qualifies());

        let attempts = vec![failed(Some(2), "Can't connect to MySQL server on '::1' (10061)")];
        assert!(windows.should_fall_back(&attempts));
        assert!(!other.should_fall_back(&attempts));
    }

    #[test]
    fn test_explicit_modes_override_platform() {
        let attempts = vec![failed(Some(2), "ERROR 2003 (HY000): Can't connect")];
        assert!(FallbackClassifier::with_default_signatures(FallbackMode::Always, Platform::Other)
            .should_fall_back(&attempts));
        assert!(!FallbackClassifier::with_default_signatures(FallbackMode::Never, Platform::Windows)
            .should_fall_back(&attempts));
    }

    #[test]
    fn test_unrelated_failures_do_not_qualify() {
        let classifier = FallbackClassifier::with_default_signatures(FallbackMode::Always, Platform::Other);
        let attempts = vec![
            failed(Some(2), "Access denied for user 'root'@'localhost'"),
            failed(Some(0), "Can't connect to MySQL server"),
            failed(None, "Can't connect to MySQL server"),
        ];
        assert!(!classifier.should_fall_back(&attempts));
    }

    #[test]
    fn test_timeouts_do_not_qualify() {
        let classifier = FallbackClassifier::with_default_signatures(FallbackMode::Always, Platform::Other);
        let mut attempt = failed(Some(1), "Can't connect to MySQL server");
        attempt.timed_out = true;
        assert!(!classifier.is_transport_unavailable(&attempt));
    }

    #[test]
    fn test_custom_signatures_are_case_insensitive() {
        let classifier = FallbackClassifier::new(FallbackMode::Always, Platform::Other, ["  Socket Gone  ", ""]);
        assert!(classifier.is_transport_unavailable(&failed(Some(1), "fatal: SOCKET GONE")));
        assert!(!classifier.is_transport_unavailable(&failed(Some(1), "Can't connect to MySQL server")));
    }
}
