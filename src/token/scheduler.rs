//! Proactive refresh timer.
//!
//! At most one timer is outstanding per scheduler: arming always cancels the
//! previous task first, and teardown cancels whatever is left. The timer
//! task is detached; cancellation is an abort, and the armed future must
//! tolerate never running.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Schedules a single future ahead of a token expiry.
pub struct RefreshScheduler {
    /// How far ahead of expiry the timer fires.
    lead: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(lead: Duration) -> Self {
        Self {
            lead,
            handle: Mutex::new(None),
        }
    }

    /// Arm the timer for `expires_at - now - lead`.
    ///
    /// Returns `false` without arming when that delay is not positive; the
    /// caller should re-validate immediately instead of waiting. Any
    /// previously armed timer is cancelled first.
    pub fn arm<F>(&self, expires_at: i64, on_fire: F) -> bool
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let now_ms = Utc::now().timestamp_millis();
        let fire_at_ms = expires_at
            .saturating_mul(1000)
            .saturating_sub(self.lead.as_millis() as i64);
        let delay_ms = fire_at_ms - now_ms;
        if delay_ms <= 0 {
            debug!(expires_at, "refresh window already open, timer not armed");
            return false;
        }

        debug!(delay_ms, "refresh timer armed");
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
            on_fire.await;
        });
        *self.handle.lock().unwrap() = Some(task);
        true
    }

    /// Cancel the outstanding timer, if any.
    pub fn cancel(&self) {
        if let Some(task) = self.handle.lock().unwrap().take() {
            task.abort();
        }
    }

    /// Whether a timer is currently pending.
    pub fn is_armed(&self) -> bool {
        self.handle
            .lock()
            .unwrap()
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("lead", &self.lead)
            .field("armed", &self.is_armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn expiry_in_ms(ms: i64) -> i64 {
        // Expiry timestamps have second granularity; round up so the window
        // math stays positive in fast tests.
        (Utc::now().timestamp_millis() + ms + 999) / 1000
    }

    #[tokio::test]
    async fn test_fires_after_lead_window() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(900));
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();

        let armed = scheduler.arm(expiry_in_ms(1000), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(armed);
        assert!(scheduler.is_armed());

        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_armed());
    }

    #[tokio::test]
    async fn test_not_armed_when_window_already_open() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(300));
        let armed = scheduler.arm(Utc::now().timestamp() + 10, async {});
        assert!(!armed);
        assert!(!scheduler.is_armed());
    }

    #[tokio::test]
    async fn test_rearm_cancels_previous() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(0));
        let fired = Arc::new(AtomicU32::new(0));

        let first = fired.clone();
        assert!(scheduler.arm(expiry_in_ms(40), async move {
            first.fetch_add(1, Ordering::SeqCst);
        }));

        // Re-arm before the first timer fires; only the second may run.
        let second = fired.clone();
        assert!(scheduler.arm(expiry_in_ms(60), async move {
            second.fetch_add(10, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_cancel_prevents_firing() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(0));
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();

        assert!(scheduler.arm(expiry_in_ms(50), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));
        scheduler.cancel();
        assert!(!scheduler.is_armed());

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
