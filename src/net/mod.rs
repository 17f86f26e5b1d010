//! Connectivity-aware retry helper.
//!
//! [`ConnectivityMonitor`] wraps the platform probe with a short-lived cache,
//! runs operations under a bounded exponential backoff, and offers a polling
//! wait-for-connection primitive. All waits are cooperative suspension
//! points; nothing here blocks the runtime.

use std::cmp::min;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{ErrorCategory, ErrorReporter};
use crate::traits::ConnectivityProbe;

/// Tuning knobs for connectivity checks and retries.
///
/// Everything time-shaped is configuration so tests can run with near-zero
/// delays.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// How long a probe result may be served from cache.
    pub cache_ttl: Duration,
    /// Backoff schedule between attempts; the last entry is the ceiling.
    pub backoff: Vec<Duration>,
    /// Default retry budget for [`ConnectivityMonitor::execute_with_retry`].
    pub max_retries: u32,
    /// Poll interval for [`ConnectivityMonitor::wait_for_connection`].
    pub poll_interval: Duration,
    /// Default timeout for [`ConnectivityMonitor::wait_for_connection`].
    pub wait_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            backoff: vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(8000),
            ],
            max_retries: 3,
            poll_interval: Duration::from_millis(1000),
            wait_timeout: Duration::from_secs(30),
        }
    }
}

/// Why a retried operation ultimately failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetryError<E> {
    /// The device was offline on the final attempt.
    #[error("device is offline")]
    Offline,
    /// The operation itself failed on the final attempt.
    #[error("{0}")]
    Operation(E),
}

/// Connectivity cache plus bounded-retry executor.
pub struct ConnectivityMonitor {
    probe: Arc<dyn ConnectivityProbe>,
    reporter: ErrorReporter,
    config: RetryConfig,
    cached: Mutex<Option<(bool, Instant)>>,
}

impl ConnectivityMonitor {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        reporter: ErrorReporter,
        config: RetryConfig,
    ) -> Self {
        Self {
            probe,
            reporter,
            config,
            cached: Mutex::new(None),
        }
    }

    /// Whether the device currently has usable connectivity.
    ///
    /// With `use_cache`, a probe result younger than the configured TTL is
    /// served without touching the platform. A fresh probe requires both a
    /// connection and internet reachability.
    pub async fn check_connectivity(&self, use_cache: bool) -> bool {
        if use_cache {
            if let Some((online, at)) = *self.cached.lock().unwrap() {
                if at.elapsed() < self.config.cache_ttl {
                    return online;
                }
            }
        }

        let state = self.probe.fetch().await;
        let online = state.is_online();
        *self.cached.lock().unwrap() = Some((online, Instant::now()));
        debug!(online, "connectivity probe");
        online
    }

    /// Drop the cached probe result (used by change subscriptions).
    pub fn invalidate_cache(&self) {
        *self.cached.lock().unwrap() = None;
    }

    /// Run `op` with up to `max_retries` retries and bounded backoff.
    ///
    /// Every attempt re-checks connectivity uncached first; an offline
    /// device consumes the attempt exactly like a functional failure. The
    /// backoff schedule is indexed by `min(attempt, len - 1)`, exponential
    /// up to a ceiling. The last error is returned once the budget is spent.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        max_retries: u32,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = max_retries + 1;
        let mut last_err: Option<RetryError<E>> = None;

        for attempt in 0..attempts {
            if self.check_connectivity(false).await {
                match op(attempt).await {
                    Ok(value) => return Ok(value),
                    Err(err) => {
                        debug!(attempt, "attempt failed: {}", err);
                        last_err = Some(RetryError::Operation(err));
                    }
                }
            } else {
                debug!(attempt, "attempt skipped: offline");
                last_err = Some(RetryError::Offline);
            }

            if attempt + 1 < attempts {
                let idx = min(attempt as usize, self.config.backoff.len() - 1);
                tokio::time::sleep(self.config.backoff[idx]).await;
            }
        }

        let err = last_err.unwrap_or(RetryError::Offline);
        self.reporter.log_error(
            &err,
            "execute_with_retry",
            Some(serde_json::json!({ "retries": max_retries })),
            Some(ErrorCategory::Network),
        );
        Err(err)
    }

    /// Run `op` with the configured default retry budget.
    pub async fn execute_with_default_retry<T, E, F, Fut>(
        &self,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_with_retry(self.config.max_retries, op).await
    }

    /// Poll until the device is online or the timeout elapses.
    ///
    /// Returns whether a connection was observed; never errors.
    pub async fn wait_for_connection(&self, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(self.config.wait_timeout);
        let started = Instant::now();

        loop {
            if self.check_connectivity(false).await {
                return true;
            }
            if started.elapsed() >= timeout {
                warn!(?timeout, "wait_for_connection timed out");
                return false;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("cached", &*self.cached.lock().unwrap())
            .finish()
    }
}
