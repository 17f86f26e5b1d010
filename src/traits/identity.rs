//! Identity service trait abstraction.
//!
//! The identity collaborator answers "who does this token belong to" and
//! mints replacement tokens. The core never talks HTTP itself; a production
//! adapter owns the endpoint catalog.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::session::UserProfile;

/// Identity service transport errors.
///
/// An invalid token is **not** an error: `owner_details` reports it as
/// `Ok(None)`. Errors mean the service could not be asked at all.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IdentityError {
    #[error("identity service unreachable: {0}")]
    Network(String),
    #[error("identity service failed: {0}")]
    Server(String),
}

/// Tokens minted by a successful refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry as a Unix timestamp (seconds since epoch).
    pub expires_at: Option<i64>,
}

/// Trait for the identity/API collaborator.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Fetch the profile the token belongs to.
    ///
    /// `Ok(None)` means the token was rejected; the absence of a well-formed
    /// result is invalid-token, not a network failure.
    async fn owner_details(&self, token: &str) -> Result<Option<UserProfile>, IdentityError>;

    /// Exchange a refresh token for a new token set.
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenSet, IdentityError>;

    /// Invalidate the session server-side. Used fire-and-forget on logout;
    /// local teardown never waits for it.
    async fn invalidate_session(&self, token: &str) -> Result<(), IdentityError>;
}
