//! Token lifecycle management.
//!
//! [`TokenManager`] answers "is this token valid" with a short-TTL cache in
//! front of the identity service, refreshes tokens under a small retry
//! budget, and owns the validation cache lifecycle. Expected failures are
//! returned as tagged results ([`Validation`], [`RefreshOutcome`]), never as
//! `Err`; the session machine pattern-matches on them.

mod scheduler;

pub use scheduler::RefreshScheduler;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{AuthFailure, ErrorCategory, ErrorReporter};
use crate::net::ConnectivityMonitor;
use crate::session::UserProfile;
use crate::traits::{IdentityApi, IdentityError, TokenSet};

/// Token lifecycle tuning knobs.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// How long a positive validation result may be served from cache.
    pub cache_ttl: Duration,
    /// Negative results live `negative_ttl_ratio × cache_ttl` so a stale
    /// failure is not trusted as long as a stale success.
    pub negative_ttl_ratio: f64,
    /// Total refresh attempts per [`TokenManager::refresh_token`] call.
    pub refresh_attempts: u32,
    /// Linear backoff unit: attempt `n` waits `n × refresh_backoff_unit`.
    pub refresh_backoff_unit: Duration,
    /// How far ahead of expiry the proactive refresh timer fires.
    pub refresh_lead: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            negative_ttl_ratio: 0.7,
            refresh_attempts: 2,
            refresh_backoff_unit: Duration::from_millis(1000),
            refresh_lead: Duration::from_secs(300),
        }
    }
}

/// Result of a token validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid { profile: UserProfile },
    Invalid { reason: AuthFailure },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }

    pub fn reason(&self) -> Option<AuthFailure> {
        match self {
            Validation::Valid { .. } => None,
            Validation::Invalid { reason } => Some(*reason),
        }
    }
}

/// Result of a token refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed(TokenSet),
    Failed { reason: AuthFailure },
}

struct CacheEntry {
    outcome: Validation,
    at: Instant,
}

/// Validates and refreshes tokens; sole owner of the validation cache.
pub struct TokenManager {
    identity: Arc<dyn IdentityApi>,
    net: Arc<ConnectivityMonitor>,
    reporter: ErrorReporter,
    config: TokenConfig,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl TokenManager {
    pub fn new(
        identity: Arc<dyn IdentityApi>,
        net: Arc<ConnectivityMonitor>,
        reporter: ErrorReporter,
        config: TokenConfig,
    ) -> Self {
        Self {
            identity,
            net,
            reporter,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Validate a token, serving cached results inside their TTL.
    ///
    /// An empty token short-circuits to `Invalid(NoToken)`. A cache miss
    /// checks connectivity before asking the identity service. Only verdicts
    /// about the token itself are cached; offline answers and transport
    /// failures say nothing about the token and are returned uncached.
    pub async fn validate_token(&self, token: &str, use_cache: bool) -> Validation {
        if token.is_empty() {
            return Validation::Invalid {
                reason: AuthFailure::NoToken,
            };
        }

        if use_cache {
            if let Some(hit) = self.cache_lookup(token) {
                debug!("validation served from cache");
                return hit;
            }
        }

        if !self.net.check_connectivity(true).await {
            return Validation::Invalid {
                reason: AuthFailure::Network,
            };
        }

        let outcome = match self.identity.owner_details(token).await {
            Ok(Some(profile)) => Validation::Valid { profile },
            Ok(None) => Validation::Invalid {
                reason: AuthFailure::InvalidToken,
            },
            Err(err) => {
                self.reporter.log_error(
                    &err,
                    "validate_token",
                    None,
                    Some(ErrorCategory::Auth),
                );
                let reason = match err {
                    IdentityError::Network(_) => AuthFailure::Network,
                    IdentityError::Server(_) => AuthFailure::Server,
                };
                return Validation::Invalid { reason };
            }
        };

        self.cache_store(token, outcome.clone());
        outcome
    }

    /// Exchange a refresh token for new tokens, retrying with linear
    /// backoff.
    ///
    /// Every attempt re-checks connectivity uncached. A success invalidates
    /// the entire validation cache: new tokens void old assumptions.
    pub async fn refresh_token(&self, refresh_token: &str) -> RefreshOutcome {
        if refresh_token.is_empty() {
            return RefreshOutcome::Failed {
                reason: AuthFailure::NoToken,
            };
        }

        let attempts = self.config.refresh_attempts.max(1);
        for attempt in 1..=attempts {
            if self.net.check_connectivity(false).await {
                match self.identity.refresh_tokens(refresh_token).await {
                    Ok(tokens) => {
                        info!(attempt, "token refresh succeeded");
                        self.invalidate_cache();
                        return RefreshOutcome::Refreshed(tokens);
                    }
                    Err(err) => {
                        self.reporter.log_error(
                            &err,
                            "refresh_token",
                            Some(serde_json::json!({ "attempt": attempt })),
                            Some(ErrorCategory::Auth),
                        );
                    }
                }
            } else {
                debug!(attempt, "refresh attempt skipped: offline");
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.refresh_backoff_unit * attempt).await;
            }
        }

        RefreshOutcome::Failed {
            reason: AuthFailure::Refresh,
        }
    }

    /// Drop every cached validation result.
    pub fn invalidate_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    /// Number of cached validation entries (test observability).
    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    fn cache_lookup(&self, token: &str) -> Option<Validation> {
        let cache = self.cache.lock().unwrap();
        let entry = cache.get(token)?;
        let ttl = if entry.outcome.is_valid() {
            self.config.cache_ttl
        } else {
            self.config.cache_ttl.mul_f64(self.config.negative_ttl_ratio)
        };
        if entry.at.elapsed() < ttl {
            Some(entry.outcome.clone())
        } else {
            None
        }
    }

    fn cache_store(&self, token: &str, outcome: Validation) {
        self.cache.lock().unwrap().insert(
            token.to_string(),
            CacheEntry {
                outcome,
                at: Instant::now(),
            },
        );
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("cache_len", &self.cache_len())
            .finish()
    }
}
