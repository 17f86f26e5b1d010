//! Session state types and the pure transition function.
//!
//! The session is a strict finite-state machine: a tagged union of states
//! plus [`reduce`]. `Authenticated` carries its credentials, so an
//! authenticated session without credentials is unrepresentable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthFailure;
use crate::traits::TokenSet;

/// Opaque credential record for the signed-in user.
///
/// `token` and `access_token` are aliases kept in sync; older screens read
/// one name, newer ones the other.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub token: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry as a Unix timestamp (seconds since epoch).
    pub token_expiry: Option<i64>,
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Why a `set_credentials` payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("credentials payload must be an object")]
    NotAnObject,
    #[error("credentials payload is missing required field: email")]
    MissingEmail,
}

impl Credentials {
    /// Parse a raw sign-in payload.
    ///
    /// `email` is required; the token may arrive under either alias and both
    /// are populated from whichever is present.
    pub fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        let map = payload.as_object().ok_or(PayloadError::NotAnObject)?;

        let email = map
            .get("email")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
            .ok_or(PayloadError::MissingEmail)?
            .to_string();

        let token = map
            .get("token")
            .or_else(|| map.get("accessToken"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let refresh_token = map
            .get("refreshToken")
            .and_then(Value::as_str)
            .map(str::to_string);
        let token_expiry = map.get("tokenExpiry").and_then(Value::as_i64);

        let known = ["token", "accessToken", "refreshToken", "tokenExpiry", "email"];
        let extra = map
            .iter()
            .filter(|(k, _)| !known.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            token: token.clone(),
            access_token: token,
            refresh_token,
            token_expiry,
            email: Some(email),
            extra,
        })
    }

    /// Merge freshly minted tokens into this record, keeping the aliases in
    /// sync and preserving fields the refresh did not replace.
    pub fn merged_with(&self, tokens: &TokenSet) -> Self {
        let mut merged = self.clone();
        merged.token = tokens.access_token.clone();
        merged.access_token = tokens.access_token.clone();
        if let Some(refresh) = &tokens.refresh_token {
            merged.refresh_token = Some(refresh.clone());
        }
        if let Some(expiry) = tokens.expires_at {
            merged.token_expiry = Some(expiry);
        }
        merged
    }

    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }
}

/// Profile and permission data for the signed-in user.
///
/// The profile can be richer than the credentials: it is fetched separately
/// and may carry whatever the identity service returns in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub permissions: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Sentinel permission that grants everything.
pub const ADMIN_PERMISSION: &str = "admin";

impl UserProfile {
    /// Whether the profile carries the named permission (or the admin
    /// sentinel).
    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == name || p == ADMIN_PERMISSION)
    }
}

/// The canonical session state. Exactly one variant holds at any instant.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Process start; persisted credentials not yet examined.
    Loading,
    Authenticated {
        credentials: Credentials,
        profile: UserProfile,
    },
    /// A refresh is in flight; the previous credentials remain visible so
    /// API callers keep working during the exchange.
    Refreshing {
        credentials: Credentials,
        profile: UserProfile,
    },
    Unauthenticated,
    Failed {
        reason: AuthFailure,
    },
}

/// Externally observable phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Loading,
    Authenticated,
    Unauthenticated,
    Error,
    Refreshing,
}

impl std::fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AuthPhase::Loading => "loading",
            AuthPhase::Authenticated => "authenticated",
            AuthPhase::Unauthenticated => "unauthenticated",
            AuthPhase::Error => "error",
            AuthPhase::Refreshing => "refreshing",
        };
        write!(f, "{}", label)
    }
}

impl SessionState {
    pub fn phase(&self) -> AuthPhase {
        match self {
            SessionState::Loading => AuthPhase::Loading,
            SessionState::Authenticated { .. } => AuthPhase::Authenticated,
            SessionState::Refreshing { .. } => AuthPhase::Refreshing,
            SessionState::Unauthenticated => AuthPhase::Unauthenticated,
            SessionState::Failed { .. } => AuthPhase::Error,
        }
    }

    /// Credentials visible in this state, if any.
    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            SessionState::Authenticated { credentials, .. }
            | SessionState::Refreshing { credentials, .. } => Some(credentials),
            _ => None,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated { profile, .. }
            | SessionState::Refreshing { profile, .. } => Some(profile),
            _ => None,
        }
    }
}

/// State machine inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    StartLoading,
    SignedIn {
        credentials: Credentials,
        profile: UserProfile,
    },
    RefreshStarted,
    RefreshSucceeded {
        tokens: TokenSet,
    },
    ProfileUpdated {
        profile: UserProfile,
    },
    Failed {
        reason: AuthFailure,
    },
    SignedOut,
}

/// Apply a transition.
///
/// Total over all (state, transition) pairs: a transition that is invalid in
/// the current state returns the state unchanged, and the caller decides
/// whether that is worth logging.
pub fn reduce(state: SessionState, transition: Transition) -> SessionState {
    match (state, transition) {
        (_, Transition::StartLoading) => SessionState::Loading,

        (_, Transition::SignedIn { credentials, profile }) => {
            SessionState::Authenticated { credentials, profile }
        }

        (SessionState::Authenticated { credentials, profile }, Transition::RefreshStarted) => {
            SessionState::Refreshing { credentials, profile }
        }

        (
            SessionState::Refreshing { credentials, profile },
            Transition::RefreshSucceeded { tokens },
        )
        | (
            SessionState::Authenticated { credentials, profile },
            Transition::RefreshSucceeded { tokens },
        ) => SessionState::Authenticated {
            credentials: credentials.merged_with(&tokens),
            profile,
        },

        (SessionState::Authenticated { credentials, .. }, Transition::ProfileUpdated { profile }) => {
            SessionState::Authenticated { credentials, profile }
        }
        (SessionState::Refreshing { credentials, .. }, Transition::ProfileUpdated { profile }) => {
            SessionState::Refreshing { credentials, profile }
        }

        (_, Transition::Failed { reason }) => SessionState::Failed { reason },

        (_, Transition::SignedOut) => SessionState::Unauthenticated,

        // Invalid in the current state: no-op.
        (state, _) => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn creds(token: &str) -> Credentials {
        Credentials {
            token: token.to_string(),
            access_token: token.to_string(),
            refresh_token: Some("refresh".into()),
            token_expiry: Some(1_900_000_000),
            email: Some("owner@example.com".into()),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_from_payload_requires_email() {
        assert_eq!(
            Credentials::from_payload(&json!({"token": "abc"})),
            Err(PayloadError::MissingEmail)
        );
        assert_eq!(
            Credentials::from_payload(&json!({"email": ""})),
            Err(PayloadError::MissingEmail)
        );
        assert_eq!(
            Credentials::from_payload(&json!("nope")),
            Err(PayloadError::NotAnObject)
        );
    }

    #[test]
    fn test_from_payload_syncs_token_aliases() {
        let c = Credentials::from_payload(&json!({
            "email": "owner@example.com",
            "accessToken": "abc",
        }))
        .unwrap();
        assert_eq!(c.token, "abc");
        assert_eq!(c.access_token, "abc");

        let c = Credentials::from_payload(&json!({
            "email": "owner@example.com",
            "token": "xyz",
        }))
        .unwrap();
        assert_eq!(c.token, "xyz");
        assert_eq!(c.access_token, "xyz");
    }

    #[test]
    fn test_from_payload_keeps_unknown_fields() {
        let c = Credentials::from_payload(&json!({
            "email": "owner@example.com",
            "token": "abc",
            "deviceId": "phone-1",
        }))
        .unwrap();
        assert_eq!(c.extra["deviceId"], "phone-1");
    }

    #[test]
    fn test_merged_with_replaces_tokens_and_keeps_rest() {
        let merged = creds("old").merged_with(&TokenSet {
            access_token: "new".into(),
            refresh_token: None,
            expires_at: Some(2_000_000_000),
        });
        assert_eq!(merged.token, "new");
        assert_eq!(merged.access_token, "new");
        // No replacement refresh token: the old one survives.
        assert_eq!(merged.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(merged.token_expiry, Some(2_000_000_000));
        assert_eq!(merged.email.as_deref(), Some("owner@example.com"));
    }

    #[test]
    fn test_has_permission_with_sentinel() {
        let profile = UserProfile {
            permissions: vec!["tickets.write".into()],
            ..Default::default()
        };
        assert!(profile.has_permission("tickets.write"));
        assert!(!profile.has_permission("payments.write"));

        let admin = UserProfile {
            permissions: vec![ADMIN_PERMISSION.into()],
            ..Default::default()
        };
        assert!(admin.has_permission("payments.write"));
        assert!(admin.has_permission("anything"));
    }

    #[test]
    fn test_reduce_signed_in_from_anywhere() {
        for start in [
            SessionState::Loading,
            SessionState::Unauthenticated,
            SessionState::Failed {
                reason: AuthFailure::TokenExpired,
            },
            // A validation settling mid-refresh lands in Authenticated.
            SessionState::Refreshing {
                credentials: creds("stale"),
                profile: UserProfile::default(),
            },
        ] {
            let next = reduce(
                start,
                Transition::SignedIn {
                    credentials: creds("t"),
                    profile: UserProfile::default(),
                },
            );
            assert_eq!(next.phase(), AuthPhase::Authenticated);
            assert!(next.credentials().is_some());
        }
    }

    #[test]
    fn test_reduce_refresh_cycle() {
        let authed = SessionState::Authenticated {
            credentials: creds("old"),
            profile: UserProfile::default(),
        };
        let refreshing = reduce(authed, Transition::RefreshStarted);
        assert_eq!(refreshing.phase(), AuthPhase::Refreshing);
        // Credentials stay visible during the exchange.
        assert_eq!(refreshing.credentials().unwrap().token, "old");

        let back = reduce(
            refreshing,
            Transition::RefreshSucceeded {
                tokens: TokenSet {
                    access_token: "new".into(),
                    refresh_token: None,
                    expires_at: Some(42),
                },
            },
        );
        assert_eq!(back.phase(), AuthPhase::Authenticated);
        assert_eq!(back.credentials().unwrap().token, "new");
        assert_eq!(back.credentials().unwrap().token_expiry, Some(42));
    }

    #[test]
    fn test_reduce_refresh_started_invalid_elsewhere() {
        assert_eq!(
            reduce(SessionState::Unauthenticated, Transition::RefreshStarted),
            SessionState::Unauthenticated
        );
        assert_eq!(
            reduce(SessionState::Loading, Transition::RefreshStarted),
            SessionState::Loading
        );
    }

    #[test]
    fn test_reduce_refresh_succeeded_invalid_when_signed_out() {
        let tokens = TokenSet {
            access_token: "new".into(),
            ..Default::default()
        };
        assert_eq!(
            reduce(
                SessionState::Unauthenticated,
                Transition::RefreshSucceeded { tokens }
            ),
            SessionState::Unauthenticated
        );
    }

    #[test]
    fn test_reduce_profile_update_only_while_signed_in() {
        let profile = UserProfile {
            name: Some("Dana".into()),
            ..Default::default()
        };
        let updated = reduce(
            SessionState::Authenticated {
                credentials: creds("t"),
                profile: UserProfile::default(),
            },
            Transition::ProfileUpdated {
                profile: profile.clone(),
            },
        );
        assert_eq!(updated.profile().unwrap().name.as_deref(), Some("Dana"));

        assert_eq!(
            reduce(
                SessionState::Unauthenticated,
                Transition::ProfileUpdated { profile }
            ),
            SessionState::Unauthenticated
        );
    }

    #[test]
    fn test_reduce_failed_and_signed_out_from_anywhere() {
        let failed = reduce(
            SessionState::Authenticated {
                credentials: creds("t"),
                profile: UserProfile::default(),
            },
            Transition::Failed {
                reason: AuthFailure::TokenExpired,
            },
        );
        assert_eq!(failed.phase(), AuthPhase::Error);
        assert!(failed.credentials().is_none());

        assert_eq!(
            reduce(failed, Transition::SignedOut),
            SessionState::Unauthenticated
        );
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(AuthPhase::Refreshing.to_string(), "refreshing");
        assert_eq!(AuthPhase::Error.to_string(), "error");
    }

    #[test]
    fn test_profile_serde_round_trip_with_extra() {
        let json = json!({
            "name": "Dana",
            "email": "dana@example.com",
            "permissions": ["tickets.write"],
            "propertyCount": 3,
        });
        let profile: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.extra["propertyCount"], 3);
        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back["propertyCount"], 3);
    }
}
