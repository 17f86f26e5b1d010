//! Persistent user storage trait abstraction.
//!
//! Abstracts the device key-value store the session machine persists
//! credentials into, enabling dependency injection and mocking in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::UserProfile;

/// Storage operation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read user data: {0}")]
    ReadFailed(String),
    #[error("failed to write user data: {0}")]
    WriteFailed(String),
    #[error("failed to clear user data: {0}")]
    ClearFailed(String),
    /// The stored entry could not be decoded. Callers recover by
    /// discarding it and treating the session as unauthenticated.
    #[error("stored user data is corrupted: {0}")]
    Corrupted(String),
}

/// The persisted session record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredUser {
    /// Opaque access token.
    pub token: String,
    /// Opaque refresh token, when the identity service issued one.
    pub refresh_token: Option<String>,
    /// Profile snapshot from the last successful fetch.
    pub profile: UserProfile,
    /// When the user last signed in.
    pub last_login: Option<DateTime<Utc>>,
    /// Whether the record passed the write-back verification read.
    pub is_complete: bool,
}

/// Trait for the persistent user store.
///
/// Writes are expected to be atomic enough that a verification read-back can
/// detect corruption; concurrent writers are not coordinated beyond last
/// write wins, which is acceptable because the session machine serializes
/// its own writes.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Load the persisted session record.
    ///
    /// Returns `Ok(None)` when nothing is stored. A decode failure surfaces
    /// as [`StorageError::Corrupted`].
    async fn get_user_data(&self) -> Result<Option<StoredUser>, StorageError>;

    /// Persist the session record, replacing any existing one.
    async fn store_user_data(
        &self,
        profile: &UserProfile,
        token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Remove the persisted session record.
    async fn clear_user_data(&self) -> Result<(), StorageError>;
}
