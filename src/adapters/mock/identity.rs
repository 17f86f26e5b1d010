//! Scriptable [`IdentityApi`] mock.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::session::UserProfile;
use crate::traits::{IdentityApi, IdentityError, TokenSet};

/// Mock identity service.
///
/// By default every token is rejected (`owner_details` returns `Ok(None)`)
/// and refreshes fail; tests opt into success with [`set_profile`] and
/// [`set_refresh_result`].
///
/// [`set_profile`]: MockIdentityApi::set_profile
/// [`set_refresh_result`]: MockIdentityApi::set_refresh_result
#[derive(Default)]
pub struct MockIdentityApi {
    profile: Mutex<Option<UserProfile>>,
    reject_tokens: AtomicBool,
    owner_details_error: Mutex<Option<IdentityError>>,
    refresh_result: Mutex<Option<Result<TokenSet, IdentityError>>>,
    owner_details_calls: AtomicU32,
    refresh_calls: AtomicU32,
    invalidate_calls: AtomicU32,
}

impl MockIdentityApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept tokens and return this profile.
    pub fn set_profile(&self, profile: UserProfile) {
        *self.profile.lock().unwrap() = Some(profile);
    }

    /// Reject every token even when a profile is configured.
    pub fn set_reject_tokens(&self, reject: bool) {
        self.reject_tokens.store(reject, Ordering::SeqCst);
    }

    /// Make `owner_details` fail with this error.
    pub fn set_owner_details_error(&self, err: IdentityError) {
        *self.owner_details_error.lock().unwrap() = Some(err);
    }

    /// Let `owner_details` answer normally again.
    pub fn clear_owner_details_error(&self) {
        *self.owner_details_error.lock().unwrap() = None;
    }

    /// Script the outcome of every refresh call.
    pub fn set_refresh_result(&self, result: Result<TokenSet, IdentityError>) {
        *self.refresh_result.lock().unwrap() = Some(result);
    }

    pub fn owner_details_calls(&self) -> u32 {
        self.owner_details_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn invalidate_calls(&self) -> u32 {
        self.invalidate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityApi for MockIdentityApi {
    async fn owner_details(&self, _token: &str) -> Result<Option<UserProfile>, IdentityError> {
        self.owner_details_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.owner_details_error.lock().unwrap().clone() {
            return Err(err);
        }
        if self.reject_tokens.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn refresh_tokens(&self, _refresh_token: &str) -> Result<TokenSet, IdentityError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(IdentityError::Server("no refresh scripted".into())))
    }

    async fn invalidate_session(&self, _token: &str) -> Result<(), IdentityError> {
        self.invalidate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
