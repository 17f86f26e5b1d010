//! Rate-limited failure reporting facility.
//!
//! The reporter is an explicitly constructed, injectable service: every
//! component that needs to record a failure holds a clone of it. Entries land
//! in a bounded ring buffer, get mirrored to the `tracing` log, and, when
//! reporting is enabled, are forwarded to an optional analytics sink with
//! validation noise filtered out and network errors rate-limited.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ErrorCategory;
use crate::traits::AnalyticsSink;

/// Metadata keys containing any of these substrings are redacted.
const SENSITIVE_KEY_MARKERS: &[&str] = &["password", "token", "secret", "key", "credential"];

/// Replacement value for redacted metadata entries.
const REDACTED: &str = "[REDACTED]";

/// Reporter tuning knobs.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Maximum retained log entries; oldest are evicted first.
    pub capacity: usize,
    /// Whether entries are forwarded to the analytics sink at all.
    pub reporting_enabled: bool,
    /// Maximum network-category reports per rolling window.
    pub network_report_limit: usize,
    /// Length of the network rate-limit window.
    pub network_report_window: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            reporting_enabled: true,
            network_report_limit: 3,
            network_report_window: Duration::from_secs(60),
        }
    }
}

/// A single recorded failure.
#[derive(Debug, Clone)]
pub struct ErrorLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: ErrorCategory,
    pub message: String,
    pub context: String,
    pub metadata: Value,
}

/// Aggregate reporter counters, exposed for diagnostics screens and tests.
#[derive(Debug, Clone, Default)]
pub struct ReporterStats {
    pub total_logged: u64,
    pub buffered: usize,
    pub by_category: HashMap<ErrorCategory, u64>,
    pub reports_forwarded: u64,
    pub reports_suppressed: u64,
}

/// Severity hint for user notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

type ToastHandler = Box<dyn Fn(&str, ToastKind) + Send + Sync>;

struct ReporterInner {
    config: ReporterConfig,
    entries: Mutex<VecDeque<ErrorLogEntry>>,
    by_category: Mutex<HashMap<ErrorCategory, u64>>,
    total_logged: AtomicU64,
    reports_forwarded: AtomicU64,
    reports_suppressed: AtomicU64,
    network_reports: Mutex<VecDeque<Instant>>,
    analytics: Mutex<Option<Arc<dyn AnalyticsSink>>>,
    toast: Mutex<Option<ToastHandler>>,
}

/// Shared failure-reporting service. Cheap to clone.
#[derive(Clone)]
pub struct ErrorReporter {
    inner: Arc<ReporterInner>,
}

impl ErrorReporter {
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            inner: Arc::new(ReporterInner {
                config,
                entries: Mutex::new(VecDeque::new()),
                by_category: Mutex::new(HashMap::new()),
                total_logged: AtomicU64::new(0),
                reports_forwarded: AtomicU64::new(0),
                reports_suppressed: AtomicU64::new(0),
                network_reports: Mutex::new(VecDeque::new()),
                analytics: Mutex::new(None),
                toast: Mutex::new(None),
            }),
        }
    }

    /// Attach (or replace) the analytics sink.
    pub fn set_analytics(&self, sink: Arc<dyn AnalyticsSink>) {
        *self.inner.analytics.lock().unwrap() = Some(sink);
    }

    /// Register the presentation callback used by [`show_toast`].
    ///
    /// [`show_toast`]: ErrorReporter::show_toast
    pub fn set_toast_handler<F>(&self, handler: F)
    where
        F: Fn(&str, ToastKind) + Send + Sync + 'static,
    {
        *self.inner.toast.lock().unwrap() = Some(Box::new(handler));
    }

    /// Record a failure.
    ///
    /// The category is derived from `context` and the error message when not
    /// supplied. Metadata is sanitized before it is stored or forwarded.
    pub fn log_error(
        &self,
        error: &dyn fmt::Display,
        context: &str,
        metadata: Option<Value>,
        category: Option<ErrorCategory>,
    ) -> ErrorLogEntry {
        let message = error.to_string();
        let category = category.unwrap_or_else(|| ErrorCategory::classify(context, &message));
        let metadata = sanitize(metadata.unwrap_or(Value::Null));

        let entry = ErrorLogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            category,
            message,
            context: context.to_string(),
            metadata,
        };

        warn!(
            category = category.as_str(),
            context = entry.context.as_str(),
            "{}",
            entry.message
        );

        self.inner.total_logged.fetch_add(1, Ordering::Relaxed);
        *self
            .inner
            .by_category
            .lock()
            .unwrap()
            .entry(category)
            .or_insert(0) += 1;

        {
            let mut entries = self.inner.entries.lock().unwrap();
            if entries.len() >= self.inner.config.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        self.forward(&entry);
        entry
    }

    /// Record an informational event (never forwarded to analytics).
    pub fn log_info(&self, message: &str, context: &str) {
        info!(context, "{}", message);
    }

    /// Best-effort user notification through the registered toast handler.
    ///
    /// Falls back to a log record when no handler is registered yet; the
    /// fallback is a startup safety net, not a UX path.
    pub fn show_toast(&self, message: &str, kind: ToastKind) {
        let toast = self.inner.toast.lock().unwrap();
        match toast.as_ref() {
            Some(handler) => handler(message, kind),
            None => warn!(fallback = "alert", "toast without handler: {}", message),
        }
    }

    /// Blocking-alert styled notification for error conditions.
    pub fn show_error_alert(&self, title: &str, message: &str) {
        self.show_toast(&format!("{}: {}", title, message), ToastKind::Error);
    }

    /// Snapshot of the reporter counters.
    pub fn stats(&self) -> ReporterStats {
        ReporterStats {
            total_logged: self.inner.total_logged.load(Ordering::Relaxed),
            buffered: self.inner.entries.lock().unwrap().len(),
            by_category: self.inner.by_category.lock().unwrap().clone(),
            reports_forwarded: self.inner.reports_forwarded.load(Ordering::Relaxed),
            reports_suppressed: self.inner.reports_suppressed.load(Ordering::Relaxed),
        }
    }

    /// The most recent `n` entries, newest last.
    pub fn recent(&self, n: usize) -> Vec<ErrorLogEntry> {
        let entries = self.inner.entries.lock().unwrap();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Drop all buffered entries. Counters are preserved.
    pub fn clear(&self) {
        self.inner.entries.lock().unwrap().clear();
    }

    /// Forward an entry to the analytics sink, applying the validation
    /// filter and the network rate limit.
    fn forward(&self, entry: &ErrorLogEntry) {
        if !self.inner.config.reporting_enabled || !entry.category.is_reportable() {
            return;
        }

        let sink = match self.inner.analytics.lock().unwrap().clone() {
            Some(sink) => sink,
            None => return,
        };

        if entry.category == ErrorCategory::Network && !self.admit_network_report() {
            self.inner.reports_suppressed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        sink.track_event(
            "error_logged",
            &serde_json::json!({
                "id": entry.id,
                "category": entry.category.as_str(),
                "context": entry.context,
                "message": entry.message,
            }),
        );
        self.inner.reports_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Rolling-window admission check for network-category reports.
    fn admit_network_report(&self) -> bool {
        let mut window = self.inner.network_reports.lock().unwrap();
        let now = Instant::now();
        while let Some(front) = window.front() {
            if now.duration_since(*front) > self.inner.config.network_report_window {
                window.pop_front();
            } else {
                break;
            }
        }
        if window.len() >= self.inner.config.network_report_limit {
            return false;
        }
        window.push_back(now);
        true
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(ReporterConfig::default())
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("buffered", &self.inner.entries.lock().unwrap().len())
            .finish()
    }
}

/// Redact sensitive keys in a metadata value, recursing into nested objects
/// and arrays.
fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sanitized = map
                .into_iter()
                .map(|(key, val)| {
                    let lower = key.to_lowercase();
                    if SENSITIVE_KEY_MARKERS.iter().any(|m| lower.contains(m)) {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, sanitize(val))
                    }
                })
                .collect();
            Value::Object(sanitized)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::RecordingAnalyticsSink;
    use serde_json::json;

    fn reporter_with_sink() -> (ErrorReporter, Arc<RecordingAnalyticsSink>) {
        let reporter = ErrorReporter::default();
        let sink = Arc::new(RecordingAnalyticsSink::new());
        reporter.set_analytics(sink.clone());
        (reporter, sink)
    }

    #[test]
    fn test_log_error_derives_category() {
        let reporter = ErrorReporter::default();
        let entry = reporter.log_error(&"connection refused", "fetch_profile", None, None);
        assert_eq!(entry.category, ErrorCategory::Network);
    }

    #[test]
    fn test_log_error_explicit_category_wins() {
        let reporter = ErrorReporter::default();
        let entry = reporter.log_error(
            &"connection refused",
            "fetch_profile",
            None,
            Some(ErrorCategory::Api),
        );
        assert_eq!(entry.category, ErrorCategory::Api);
    }

    #[test]
    fn test_metadata_sanitized() {
        let reporter = ErrorReporter::default();
        let entry = reporter.log_error(
            &"boom",
            "persist",
            Some(json!({
                "accessToken": "abc",
                "nested": { "api_key": "xyz", "plain": 1 },
                "password": "hunter2",
                "count": 3,
            })),
            None,
        );
        assert_eq!(entry.metadata["accessToken"], REDACTED);
        assert_eq!(entry.metadata["password"], REDACTED);
        assert_eq!(entry.metadata["nested"]["api_key"], REDACTED);
        assert_eq!(entry.metadata["nested"]["plain"], 1);
        assert_eq!(entry.metadata["count"], 3);
    }

    #[test]
    fn test_sanitize_recurses_into_arrays() {
        let out = sanitize(json!([{ "secretValue": "s" }, 2]));
        assert_eq!(out[0]["secretValue"], REDACTED);
        assert_eq!(out[1], 2);
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let reporter = ErrorReporter::new(ReporterConfig {
            capacity: 3,
            ..Default::default()
        });
        for i in 0..5 {
            reporter.log_error(&format!("error {}", i), "ctx", None, None);
        }
        let recent = reporter.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "error 2");
        assert_eq!(recent[2].message, "error 4");
        assert_eq!(reporter.stats().total_logged, 5);
    }

    #[test]
    fn test_validation_errors_not_forwarded() {
        let (reporter, sink) = reporter_with_sink();
        reporter.log_error(&"bad input", "ctx", None, Some(ErrorCategory::Validation));
        assert_eq!(sink.events().len(), 0);

        reporter.log_error(&"boom", "ctx", None, Some(ErrorCategory::Api));
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn test_network_reports_rate_limited() {
        let (reporter, sink) = reporter_with_sink();
        for _ in 0..5 {
            reporter.log_error(&"offline", "probe", None, Some(ErrorCategory::Network));
        }
        assert_eq!(sink.events().len(), 3);
        let stats = reporter.stats();
        assert_eq!(stats.reports_forwarded, 3);
        assert_eq!(stats.reports_suppressed, 2);
    }

    #[test]
    fn test_reporting_disabled_forwards_nothing() {
        let reporter = ErrorReporter::new(ReporterConfig {
            reporting_enabled: false,
            ..Default::default()
        });
        let sink = Arc::new(RecordingAnalyticsSink::new());
        reporter.set_analytics(sink.clone());

        reporter.log_error(&"boom", "ctx", None, Some(ErrorCategory::Api));
        assert!(sink.events().is_empty());
        // The entry is still buffered locally.
        assert_eq!(reporter.stats().buffered, 1);
    }

    #[test]
    fn test_forwarded_payload_has_no_metadata() {
        let (reporter, sink) = reporter_with_sink();
        reporter.log_error(
            &"boom",
            "ctx",
            Some(json!({"password": "x"})),
            Some(ErrorCategory::Api),
        );
        let events = sink.events();
        let (name, props) = &events[0];
        assert_eq!(name, "error_logged");
        assert!(props.get("password").is_none());
        assert_eq!(props["category"], "api");
    }

    #[test]
    fn test_toast_handler_invoked() {
        let reporter = ErrorReporter::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        reporter.set_toast_handler(move |msg, kind| {
            seen_clone.lock().unwrap().push((msg.to_string(), kind));
        });

        reporter.show_toast("saved", ToastKind::Success);
        reporter.show_error_alert("Sign in failed", "try again");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("saved".to_string(), ToastKind::Success));
        assert_eq!(
            seen[1],
            ("Sign in failed: try again".to_string(), ToastKind::Error)
        );
    }

    #[test]
    fn test_toast_without_handler_does_not_panic() {
        let reporter = ErrorReporter::default();
        reporter.show_toast("early startup", ToastKind::Info);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let reporter = ErrorReporter::default();
        reporter.log_error(&"boom", "ctx", None, None);
        reporter.clear();
        assert_eq!(reporter.stats().buffered, 0);
        assert_eq!(reporter.stats().total_logged, 1);
    }

    #[test]
    fn test_stats_by_category() {
        let reporter = ErrorReporter::default();
        reporter.log_error(&"a", "ctx", None, Some(ErrorCategory::Auth));
        reporter.log_error(&"b", "ctx", None, Some(ErrorCategory::Auth));
        reporter.log_error(&"c", "ctx", None, Some(ErrorCategory::Storage));
        let stats = reporter.stats();
        assert_eq!(stats.by_category[&ErrorCategory::Auth], 2);
        assert_eq!(stats.by_category[&ErrorCategory::Storage], 1);
    }
}
