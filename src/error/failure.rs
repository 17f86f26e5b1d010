//! Authentication failure taxonomy.
//!
//! Every expected failure in the token lifecycle and session machine is one
//! of these reasons. Leaf services return them inside tagged results so the
//! state machine can pattern-match without exception-style control flow.

use std::fmt;

/// Reason codes for authentication and connectivity failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFailure {
    /// No token was available for the operation.
    NoToken,

    /// The identity service rejected the token.
    InvalidToken,

    /// The token expired and could not be renewed.
    TokenExpired,

    /// The device is offline or the service is unreachable.
    Network,

    /// User input failed validation.
    Validation,

    /// The backend failed or a storage write could not be confirmed.
    Server,

    /// Token refresh failed after exhausting retries.
    Refresh,

    /// The profile lacks the permission required for the action.
    InsufficientPermissions,

    /// Unclassified failure.
    Unknown,
}

impl AuthFailure {
    /// Stable reason code used in logs and stored failure records.
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::NoToken => "NO_TOKEN",
            AuthFailure::InvalidToken => "INVALID_TOKEN",
            AuthFailure::TokenExpired => "TOKEN_EXPIRED",
            AuthFailure::Network => "NETWORK_ERROR",
            AuthFailure::Validation => "VALIDATION_ERROR",
            AuthFailure::Server => "SERVER_ERROR",
            AuthFailure::Refresh => "REFRESH_ERROR",
            AuthFailure::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AuthFailure::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Fixed, non-technical message shown to the user.
    ///
    /// Unknown reasons fall back to the generic message rather than leaking
    /// internals.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthFailure::NoToken => "Please sign in to continue.",
            AuthFailure::InvalidToken => {
                "Your session is no longer valid. Please sign in again."
            }
            AuthFailure::TokenExpired => {
                "Your session has expired. Please sign in again."
            }
            AuthFailure::Network => {
                "Unable to connect. Please check your internet connection."
            }
            AuthFailure::Validation => "Please check your input and try again.",
            AuthFailure::Server => {
                "The server is experiencing issues. Please try again later."
            }
            AuthFailure::Refresh => {
                "Your session could not be renewed. Please sign in again."
            }
            AuthFailure::InsufficientPermissions => {
                "You don't have permission for this action."
            }
            AuthFailure::Unknown => "An error occurred. Please try again.",
        }
    }

    /// Whether re-login (or a retry) can resolve this failure.
    ///
    /// Nothing here is process-fatal; `InsufficientPermissions` is the one
    /// reason the user cannot act on themselves.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AuthFailure::InsufficientPermissions)
    }

    /// Whether this failure must tear the session down and force re-login.
    pub fn forces_logout(&self) -> bool {
        matches!(self, AuthFailure::TokenExpired)
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailure::NoToken => write!(f, "no token available"),
            AuthFailure::InvalidToken => write!(f, "token rejected by identity service"),
            AuthFailure::TokenExpired => write!(f, "token expired"),
            AuthFailure::Network => write!(f, "network unavailable"),
            AuthFailure::Validation => write!(f, "input validation failed"),
            AuthFailure::Server => write!(f, "server error"),
            AuthFailure::Refresh => write!(f, "token refresh failed"),
            AuthFailure::InsufficientPermissions => write!(f, "insufficient permissions"),
            AuthFailure::Unknown => write!(f, "unknown error"),
        }
    }
}

impl std::error::Error for AuthFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AuthFailure::NoToken.code(), "NO_TOKEN");
        assert_eq!(AuthFailure::InvalidToken.code(), "INVALID_TOKEN");
        assert_eq!(AuthFailure::TokenExpired.code(), "TOKEN_EXPIRED");
        assert_eq!(AuthFailure::Network.code(), "NETWORK_ERROR");
        assert_eq!(AuthFailure::Validation.code(), "VALIDATION_ERROR");
        assert_eq!(AuthFailure::Server.code(), "SERVER_ERROR");
        assert_eq!(AuthFailure::Refresh.code(), "REFRESH_ERROR");
        assert_eq!(
            AuthFailure::InsufficientPermissions.code(),
            "INSUFFICIENT_PERMISSIONS"
        );
        assert_eq!(AuthFailure::Unknown.code(), "UNKNOWN_ERROR");
    }

    #[test]
    fn test_user_messages_are_non_technical() {
        // No reason code or internal term should leak into user messages.
        for reason in [
            AuthFailure::NoToken,
            AuthFailure::InvalidToken,
            AuthFailure::TokenExpired,
            AuthFailure::Network,
            AuthFailure::Validation,
            AuthFailure::Server,
            AuthFailure::Refresh,
            AuthFailure::InsufficientPermissions,
            AuthFailure::Unknown,
        ] {
            let msg = reason.user_message();
            assert!(!msg.is_empty());
            assert!(!msg.contains("ERROR"), "leaked code in: {}", msg);
        }
    }

    #[test]
    fn test_unknown_falls_back_to_generic() {
        assert_eq!(
            AuthFailure::Unknown.user_message(),
            "An error occurred. Please try again."
        );
    }

    #[test]
    fn test_token_expired_forces_logout() {
        assert!(AuthFailure::TokenExpired.forces_logout());
        assert!(!AuthFailure::Network.forces_logout());
        assert!(!AuthFailure::Refresh.forces_logout());
    }

    #[test]
    fn test_recoverability() {
        assert!(AuthFailure::TokenExpired.is_recoverable());
        assert!(AuthFailure::Refresh.is_recoverable());
        assert!(AuthFailure::Network.is_recoverable());
        assert!(!AuthFailure::InsufficientPermissions.is_recoverable());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", AuthFailure::TokenExpired), "token expired");
        let _: &dyn std::error::Error = &AuthFailure::Unknown;
    }
}
