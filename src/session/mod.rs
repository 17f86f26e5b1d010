//! Session orchestration.
//!
//! [`SessionManager`] drives the state machine in [`state`]: it owns the
//! persisted credentials, the token lifecycle, the proactive refresh timer,
//! and the user-facing error message. Every collaborator is injected, so the
//! whole machine runs against mocks in tests.
//!
//! All mutation goes through [`reduce`]; the manager never constructs a
//! [`SessionState`] by hand outside of the initial `Loading`.

pub mod state;

pub use state::{
    reduce, AuthPhase, Credentials, PayloadError, SessionState, Transition, UserProfile,
    ADMIN_PERMISSION,
};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AuthFailure, ErrorCategory, ErrorReporter};
use crate::navigation::{NavigateOptions, Navigator};
use crate::token::{RefreshOutcome, RefreshScheduler, TokenManager, Validation};
use crate::traits::{IdentityApi, StorageError, UserStore};

/// Session machine tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a user-facing error message stays up before auto-clearing.
    pub error_clear_delay: Duration,
    /// Route reset to after a forced logout.
    pub login_route: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            error_clear_delay: Duration::from_secs(5),
            login_route: "SignIn".to_string(),
        }
    }
}

struct SessionSlot {
    state: SessionState,
    error: Option<String>,
}

struct SessionInner {
    store: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityApi>,
    tokens: Arc<TokenManager>,
    reporter: ErrorReporter,
    navigator: Option<Navigator>,
    scheduler: RefreshScheduler,
    config: SessionConfig,
    slot: Mutex<SessionSlot>,
    /// Bumped on every error set/clear so a stale auto-clear task can detect
    /// it lost the race.
    error_generation: AtomicU64,
    /// Cleared on dispose; no await may mutate state after it flips.
    alive: AtomicBool,
}

/// Orchestrates the session lifecycle. Cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityApi>,
        tokens: Arc<TokenManager>,
        reporter: ErrorReporter,
        navigator: Option<Navigator>,
        config: SessionConfig,
    ) -> Self {
        let refresh_lead = tokens.config().refresh_lead;
        Self {
            inner: Arc::new(SessionInner {
                store,
                identity,
                tokens,
                reporter,
                navigator,
                scheduler: RefreshScheduler::new(refresh_lead),
                config,
                slot: Mutex::new(SessionSlot {
                    state: SessionState::Loading,
                    error: None,
                }),
                error_generation: AtomicU64::new(0),
                alive: AtomicBool::new(true),
            }),
        }
    }

    // ---- observers ----

    pub fn auth_phase(&self) -> AuthPhase {
        self.inner.slot.lock().unwrap().state.phase()
    }

    /// Authenticated phase with credentials present.
    pub fn is_authenticated(&self) -> bool {
        let slot = self.inner.slot.lock().unwrap();
        slot.state.phase() == AuthPhase::Authenticated && slot.state.credentials().is_some()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.inner.slot.lock().unwrap().state.credentials().cloned()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.inner.slot.lock().unwrap().state.profile().cloned()
    }

    /// The current user-facing error message, if one is showing.
    pub fn error(&self) -> Option<String> {
        self.inner.slot.lock().unwrap().error.clone()
    }

    /// Whether the signed-in profile carries the named permission.
    ///
    /// `false` when signed out; the admin sentinel grants everything.
    pub fn has_permission(&self, name: &str) -> bool {
        self.profile()
            .map(|p| p.has_permission(name))
            .unwrap_or(false)
    }

    // ---- lifecycle ----

    /// Cold start: restore the persisted session, if any.
    ///
    /// A readable record signs the user in immediately; a profile refetch is
    /// attempted on top, and any enrichment failure falls back to the stored
    /// snapshot rather than blocking startup. Corrupted records are
    /// discarded.
    pub async fn start(&self) {
        if !self.is_alive() {
            return;
        }
        self.apply(Transition::StartLoading);

        let stored = match self.inner.store.get_user_data().await {
            Ok(stored) => stored,
            Err(StorageError::Corrupted(detail)) => {
                self.inner.reporter.log_error(
                    &StorageError::Corrupted(detail),
                    "session_start",
                    None,
                    Some(ErrorCategory::Storage),
                );
                if let Err(err) = self.inner.store.clear_user_data().await {
                    warn!("failed to discard corrupted record: {}", err);
                }
                None
            }
            Err(err) => {
                self.inner.reporter.log_error(
                    &err,
                    "session_start",
                    None,
                    Some(ErrorCategory::Storage),
                );
                None
            }
        };
        if !self.is_alive() {
            return;
        }

        let stored = match stored {
            Some(stored) if !stored.token.is_empty() => stored,
            _ => {
                self.apply(Transition::SignedOut);
                return;
            }
        };

        // Best-effort enrichment; the stored profile is good enough to
        // render while offline.
        let profile = match self.inner.identity.owner_details(&stored.token).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) | Err(_) => {
                debug!("profile refetch unavailable, using stored snapshot");
                stored.profile.clone()
            }
        };
        if !self.is_alive() {
            return;
        }

        let credentials = Credentials {
            token: stored.token.clone(),
            access_token: stored.token,
            refresh_token: stored.refresh_token,
            email: profile.email.clone(),
            ..Default::default()
        };

        info!("session restored from storage");
        self.apply(Transition::SignedIn {
            credentials,
            profile,
        });
    }

    /// Accept a sign-in payload, persist it, and enter `Authenticated`.
    ///
    /// A `null` payload is an explicit sign-out. A malformed payload leaves
    /// the state untouched and surfaces a validation message. The storage
    /// write happens before the transition so a persisted session and an
    /// in-memory one cannot disagree.
    pub async fn set_credentials(&self, payload: Value) -> bool {
        if !self.is_alive() {
            return false;
        }
        if payload.is_null() {
            self.clear_credentials().await;
            return true;
        }

        let credentials = match Credentials::from_payload(&payload) {
            Ok(credentials) => credentials,
            Err(err) => {
                self.inner.reporter.log_error(
                    &err,
                    "set_credentials",
                    None,
                    Some(ErrorCategory::Validation),
                );
                self.set_error(AuthFailure::Validation.user_message());
                return false;
            }
        };

        // Profile enrichment is best-effort; the payload alone is enough to
        // sign in.
        let profile = if credentials.has_token() {
            match self.inner.identity.owner_details(&credentials.token).await {
                Ok(Some(profile)) => profile,
                Ok(None) | Err(_) => UserProfile {
                    email: credentials.email.clone(),
                    ..Default::default()
                },
            }
        } else {
            UserProfile {
                email: credentials.email.clone(),
                ..Default::default()
            }
        };
        if !self.is_alive() {
            return false;
        }

        if let Err(err) = self
            .inner
            .store
            .store_user_data(
                &profile,
                &credentials.token,
                credentials.refresh_token.as_deref(),
            )
            .await
        {
            self.inner.reporter.log_error(
                &err,
                "set_credentials",
                None,
                Some(ErrorCategory::Storage),
            );
            if !self.is_alive() {
                return false;
            }
            self.fail(AuthFailure::Server).await;
            return false;
        }
        if !self.is_alive() {
            return false;
        }

        let expiry = credentials.token_expiry;
        info!("credentials accepted");
        self.apply(Transition::SignedIn {
            credentials,
            profile,
        });
        self.clear_error();
        self.arm_refresh_timer(expiry);
        true
    }

    /// Sign out: revoke remotely (best effort), wipe local state, cancel the
    /// refresh timer.
    pub async fn clear_credentials(&self) {
        if !self.is_alive() {
            return;
        }
        let token = self.credentials().map(|c| c.token);

        // Remote revocation must not block or fail the local sign-out.
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let identity = self.inner.identity.clone();
            tokio::spawn(async move {
                if let Err(err) = identity.invalidate_session(&token).await {
                    debug!("remote session invalidation failed: {}", err);
                }
            });
        }

        if let Err(err) = self.inner.store.clear_user_data().await {
            self.inner.reporter.log_error(
                &err,
                "clear_credentials",
                None,
                Some(ErrorCategory::Storage),
            );
        }
        if !self.is_alive() {
            return;
        }

        self.inner.tokens.invalidate_cache();
        self.inner.scheduler.cancel();
        info!("signed out");
        self.apply(Transition::SignedOut);
        self.clear_error();
    }

    /// Re-check the current token against the identity service.
    ///
    /// A valid token refreshes the in-memory profile; an invalid one fails
    /// the session with the validation reason.
    pub async fn validate_session(&self) -> bool {
        if !self.is_alive() {
            return false;
        }
        let token = match self.credentials() {
            Some(credentials) if credentials.has_token() => credentials.token,
            _ => {
                self.fail(AuthFailure::NoToken).await;
                return false;
            }
        };

        let outcome = self.inner.tokens.validate_token(&token, true).await;
        if !self.is_alive() {
            return false;
        }

        match outcome {
            Validation::Valid { profile } => {
                // Settles Authenticated even if a refresh was in flight.
                if let Some(credentials) = self.credentials() {
                    self.apply(Transition::SignedIn {
                        credentials,
                        profile,
                    });
                }
                true
            }
            Validation::Invalid { reason } => {
                self.fail(reason).await;
                false
            }
        }
    }

    /// Exchange the refresh token for new tokens.
    ///
    /// The session stays usable during the exchange (`Refreshing` keeps the
    /// old credentials visible). Exhausted retries expire the session.
    pub async fn refresh_credentials(&self) -> bool {
        if !self.is_alive() {
            return false;
        }
        let refresh_token = match self.credentials().and_then(|c| c.refresh_token) {
            Some(token) if !token.is_empty() => token,
            _ => {
                self.fail(AuthFailure::NoToken).await;
                return false;
            }
        };

        self.apply(Transition::RefreshStarted);

        let outcome = self.inner.tokens.refresh_token(&refresh_token).await;
        if !self.is_alive() {
            return false;
        }

        match outcome {
            RefreshOutcome::Refreshed(tokens) => {
                let expiry = tokens.expires_at;
                self.apply(Transition::RefreshSucceeded { tokens });

                // The merged credentials are now live; a failed write is
                // logged, not fatal.
                if let (Some(credentials), Some(profile)) = (self.credentials(), self.profile()) {
                    if let Err(err) = self
                        .inner
                        .store
                        .store_user_data(
                            &profile,
                            &credentials.token,
                            credentials.refresh_token.as_deref(),
                        )
                        .await
                    {
                        self.inner.reporter.log_error(
                            &err,
                            "refresh_credentials",
                            None,
                            Some(ErrorCategory::Storage),
                        );
                    }
                }
                if !self.is_alive() {
                    return false;
                }
                self.arm_refresh_timer(expiry);
                true
            }
            RefreshOutcome::Failed { .. } => {
                self.fail(AuthFailure::TokenExpired).await;
                false
            }
        }
    }

    /// Replace the in-memory profile and persist the new snapshot.
    pub async fn update_profile(&self, profile: UserProfile) {
        if !self.is_alive() {
            return;
        }
        let credentials = match self.credentials() {
            Some(credentials) => credentials,
            None => return,
        };

        self.apply(Transition::ProfileUpdated {
            profile: profile.clone(),
        });

        if let Err(err) = self
            .inner
            .store
            .store_user_data(
                &profile,
                &credentials.token,
                credentials.refresh_token.as_deref(),
            )
            .await
        {
            self.inner.reporter.log_error(
                &err,
                "update_profile",
                None,
                Some(ErrorCategory::Storage),
            );
        }
    }

    /// Dismiss the current error message.
    pub fn clear_error(&self) {
        self.inner.error_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.slot.lock().unwrap().error = None;
    }

    /// Tear down: no further state mutation, timers cancelled.
    pub fn dispose(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        self.inner.scheduler.cancel();
    }

    // ---- internals ----

    fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    fn apply(&self, transition: Transition) {
        let mut slot = self.inner.slot.lock().unwrap();
        let current = std::mem::replace(&mut slot.state, SessionState::Unauthenticated);
        let from = current.phase();
        slot.state = reduce(current, transition);
        let to = slot.state.phase();
        if from != to {
            debug!(%from, %to, "session phase changed");
        }
    }

    /// Enter `Failed`, show the reason's message, and run forced-logout side
    /// effects when the reason demands them.
    async fn fail(&self, reason: AuthFailure) {
        self.inner.reporter.log_error(
            &reason,
            "session",
            Some(serde_json::json!({ "code": reason.code() })),
            Some(ErrorCategory::Auth),
        );
        self.apply(Transition::Failed { reason });
        self.set_error(reason.user_message());

        if !reason.forces_logout() {
            return;
        }

        warn!(code = reason.code(), "session expired, forcing logout");
        self.inner.scheduler.cancel();
        self.inner.tokens.invalidate_cache();
        if let Err(err) = self.inner.store.clear_user_data().await {
            self.inner.reporter.log_error(
                &err,
                "forced_logout",
                None,
                Some(ErrorCategory::Storage),
            );
        }
        if let Some(navigator) = &self.inner.navigator {
            navigator
                .navigate(
                    &self.inner.config.login_route,
                    Value::Null,
                    NavigateOptions {
                        reset: true,
                        ..Default::default()
                    },
                )
                .await;
        }
    }

    /// Show a message and schedule its auto-clear.
    fn set_error(&self, message: &str) {
        let generation = self.inner.error_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.slot.lock().unwrap().error = Some(message.to_string());

        let manager = self.clone();
        let delay = self.inner.config.error_clear_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !manager.is_alive() {
                return;
            }
            // A newer error (or an explicit clear) owns the slot now.
            if manager.inner.error_generation.load(Ordering::SeqCst) == generation {
                manager.inner.slot.lock().unwrap().error = None;
            }
        });
    }

    /// Re-arm the proactive refresh timer for the current credentials.
    ///
    /// Always cancels first: a timer armed for previous credentials must not
    /// fire against the new ones. Without a known expiry no timer is armed.
    fn arm_refresh_timer(&self, expires_at: Option<i64>) {
        self.inner.scheduler.cancel();
        let Some(expires_at) = expires_at else {
            return;
        };
        let manager = self.clone();
        let armed = self.inner.scheduler.arm(expires_at, async move {
            if manager.is_alive() {
                manager.refresh_credentials().await;
            }
        });
        if !armed {
            debug!("token already inside refresh window");
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("phase", &self.auth_phase().to_string())
            .field("error", &self.error())
            .finish()
    }
}
