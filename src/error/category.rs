//! Error category classification for the reporting facility.
//!
//! Categories drive reporting decisions (what gets forwarded to analytics,
//! what gets rate-limited) and give log consumers a stable grouping key.

use std::fmt;

/// High-level categorization of failure records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connectivity, timeouts, unreachable hosts.
    Network,
    /// Authentication and token lifecycle failures.
    Auth,
    /// Persistent key-value storage failures.
    Storage,
    /// Navigation dispatch and readiness failures.
    Navigation,
    /// User-input validation failures (never forwarded to analytics).
    Validation,
    /// Presentation-layer failures surfaced to the core.
    Ui,
    /// Backend API failures that are not auth or connectivity.
    Api,
    /// Anything that matched no other category.
    Unknown,
}

impl ErrorCategory {
    /// Derive a category from an operation context and error message.
    ///
    /// Checks are ordered: network, auth, storage, navigation, validation,
    /// api. The first keyword hit wins; no hit falls through to `Unknown`.
    pub fn classify(context: &str, message: &str) -> Self {
        let haystack = format!("{} {}", context, message).to_lowercase();

        const RULES: &[(ErrorCategory, &[&str])] = &[
            (
                ErrorCategory::Network,
                &["network", "connect", "offline", "timeout", "unreachable"],
            ),
            (
                ErrorCategory::Auth,
                &["auth", "token", "login", "logout", "session", "credential"],
            ),
            (
                ErrorCategory::Storage,
                &["storage", "store", "persist", "disk"],
            ),
            (
                ErrorCategory::Navigation,
                &["navigat", "route", "screen", "redirect"],
            ),
            (
                ErrorCategory::Validation,
                &["valid", "input", "required", "missing field"],
            ),
            (
                ErrorCategory::Api,
                &["api", "endpoint", "request", "response"],
            ),
        ];

        for (category, keywords) in RULES {
            if keywords.iter().any(|k| haystack.contains(k)) {
                return *category;
            }
        }
        ErrorCategory::Unknown
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Navigation => "navigation",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Ui => "ui",
            ErrorCategory::Api => "api",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Whether entries of this category are forwarded to the analytics sink.
    ///
    /// Validation failures are user-input noise and stay local.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, ErrorCategory::Validation)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
