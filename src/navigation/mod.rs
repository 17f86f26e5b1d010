//! Navigation readiness queue.
//!
//! The presentation surface mounts asynchronously relative to the session
//! machine, so a redirect requested early (say, an auto-logout before the
//! first screen exists) must not be lost. [`Navigator`] executes commands
//! immediately when the surface is ready and otherwise queues them behind a
//! polling pump that drains in submission order; a command whose deadline
//! passes resolves `false`, never an error.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ErrorCategory, ErrorReporter};
use crate::traits::{NavAction, NavCommand, NavigationSurface};

/// Readiness queue tuning knobs.
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// How often the pump re-checks surface readiness.
    pub poll_interval: Duration,
    /// How long a queued command may wait before resolving `false`.
    pub ready_timeout: Duration,
    /// Maximum retained history entries; oldest evicted first.
    pub history_limit: usize,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            ready_timeout: Duration::from_secs(5),
            history_limit: 50,
        }
    }
}

/// Record of an executed navigation command.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Timestamp plus random suffix, unique per command.
    pub id: String,
    pub action: NavAction,
    pub route: Option<String>,
    pub params: Value,
    pub timestamp: DateTime<Utc>,
}

/// Event delivered to navigation listeners after a command executes.
#[derive(Debug, Clone)]
pub struct NavEvent {
    pub action: NavAction,
    pub route: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Handle returned by [`Navigator::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

/// Options for [`Navigator::navigate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigateOptions {
    /// Replace the current route instead of pushing.
    pub replace: bool,
    /// Reset the stack to the target route.
    pub reset: bool,
}

type NavListener = Box<dyn Fn(&NavEvent) + Send + Sync>;

struct PendingCommand {
    command: NavCommand,
    done: oneshot::Sender<bool>,
    deadline: Instant,
}

struct NavigatorInner {
    config: NavigatorConfig,
    reporter: ErrorReporter,
    surface: Mutex<Option<Arc<dyn NavigationSurface>>>,
    history: Mutex<VecDeque<HistoryEntry>>,
    listeners: Mutex<Vec<(u64, NavListener)>>,
    listener_seq: AtomicU64,
    pending: Mutex<VecDeque<PendingCommand>>,
    pump_running: AtomicBool,
    alive: AtomicBool,
}

/// Deferred navigation dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct Navigator {
    inner: Arc<NavigatorInner>,
}

impl Navigator {
    pub fn new(reporter: ErrorReporter, config: NavigatorConfig) -> Self {
        Self {
            inner: Arc::new(NavigatorInner {
                config,
                reporter,
                surface: Mutex::new(None),
                history: Mutex::new(VecDeque::new()),
                listeners: Mutex::new(Vec::new()),
                listener_seq: AtomicU64::new(0),
                pending: Mutex::new(VecDeque::new()),
                pump_running: AtomicBool::new(false),
                alive: AtomicBool::new(true),
            }),
        }
    }

    /// Attach the mounted presentation surface.
    pub fn attach(&self, surface: Arc<dyn NavigationSurface>) {
        *self.inner.surface.lock().unwrap() = Some(surface);
        debug!("navigation surface attached");
    }

    /// Navigate to a named route.
    pub async fn navigate(&self, route: &str, params: Value, options: NavigateOptions) -> bool {
        let command = if options.reset {
            NavCommand::reset(route, params, 0)
        } else if options.replace {
            NavCommand::replace(route, params)
        } else {
            NavCommand::navigate(route, params)
        };
        self.dispatch(command).await
    }

    /// Go back one screen. A no-op returning `false` when the surface
    /// reports it cannot go back.
    pub async fn go_back(&self) -> bool {
        self.dispatch(NavCommand::go_back()).await
    }

    /// Reset the stack to a route at the given index.
    pub async fn reset(&self, route: &str, params: Value, index: usize) -> bool {
        self.dispatch(NavCommand::reset(route, params, index)).await
    }

    /// Replace the current route.
    pub async fn replace(&self, route: &str, params: Value) -> bool {
        self.dispatch(NavCommand::replace(route, params)).await
    }

    /// Pop to the root of the stack.
    pub async fn pop_to_top(&self) -> bool {
        self.dispatch(NavCommand::pop_to_top()).await
    }

    /// Execute a command now, or queue it until the surface is ready.
    pub async fn dispatch(&self, command: NavCommand) -> bool {
        if !self.inner.alive.load(Ordering::SeqCst) {
            return false;
        }

        // A backlog keeps submission order: new commands line up behind it
        // instead of jumping ahead while the pump drains.
        let backlog = !self.inner.pending.lock().unwrap().is_empty();
        if !backlog && self.is_ready() {
            return self.execute(&command);
        }

        debug!(action = %command.action, "surface not ready, queueing command");
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.inner.pending.lock().unwrap();
            pending.push_back(PendingCommand {
                command,
                done: tx,
                deadline: Instant::now() + self.inner.config.ready_timeout,
            });
        }
        self.ensure_pump();
        rx.await.unwrap_or(false)
    }

    /// Whether the surface is attached and accepting commands.
    pub fn is_ready(&self) -> bool {
        self.inner
            .surface
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.is_ready())
            .unwrap_or(false)
    }

    /// The route currently focused by the surface.
    pub fn current_route(&self) -> Option<String> {
        self.inner
            .surface
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|s| s.current_route())
    }

    /// Register a listener for executed commands.
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&NavEvent) + Send + Sync + 'static,
    {
        let id = self.inner.listener_seq.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .unwrap()
            .push((id, Box::new(listener)));
        ListenerHandle(id)
    }

    pub fn unsubscribe(&self, handle: ListenerHandle) {
        self.inner
            .listeners
            .lock()
            .unwrap()
            .retain(|(id, _)| *id != handle.0);
    }

    /// Snapshot of the executed-command history, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.history.lock().unwrap().iter().cloned().collect()
    }

    /// Tear down: resolve all queued commands with `false` and refuse new
    /// ones.
    pub fn dispose(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        let drained: Vec<PendingCommand> =
            self.inner.pending.lock().unwrap().drain(..).collect();
        for entry in drained {
            let _ = entry.done.send(false);
        }
    }

    /// Run a command against the ready surface, record it, and fan out.
    fn execute(&self, command: &NavCommand) -> bool {
        let surface = match self.inner.surface.lock().unwrap().clone() {
            Some(surface) => surface,
            None => return false,
        };

        if command.action == NavAction::GoBack && !surface.can_go_back() {
            debug!("go_back ignored: nothing to go back to");
            return false;
        }

        surface.dispatch(command);

        let timestamp = Utc::now();
        let entry = HistoryEntry {
            id: command_id(timestamp),
            action: command.action,
            route: command.route.clone(),
            params: command.params.clone(),
            timestamp,
        };
        {
            let mut history = self.inner.history.lock().unwrap();
            if history.len() >= self.inner.config.history_limit {
                history.pop_front();
            }
            history.push_back(entry);
        }

        self.notify(&NavEvent {
            action: command.action,
            route: command.route.clone(),
            timestamp,
        });
        true
    }

    /// Fan out to listeners; a panicking listener is isolated and logged.
    fn notify(&self, event: &NavEvent) {
        let listeners = self.inner.listeners.lock().unwrap();
        for (id, listener) in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                self.inner.reporter.log_error(
                    &format!("navigation listener {} panicked", id),
                    "navigation_notify",
                    None,
                    Some(ErrorCategory::Navigation),
                );
            }
        }
    }

    /// Start the readiness pump unless one is already running.
    fn ensure_pump(&self) {
        if self
            .inner
            .pump_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let navigator = self.clone();
        tokio::spawn(async move {
            navigator.pump().await;
            navigator.inner.pump_running.store(false, Ordering::SeqCst);
            // A command enqueued while we were winding down needs a new pump.
            if !navigator.inner.pending.lock().unwrap().is_empty() {
                navigator.ensure_pump();
            }
        });
    }

    /// Poll readiness, expiring timed-out commands and draining the queue
    /// in submission order once the surface is ready.
    async fn pump(&self) {
        loop {
            if !self.inner.alive.load(Ordering::SeqCst) {
                return;
            }

            let expired: Vec<PendingCommand> = {
                let mut pending = self.inner.pending.lock().unwrap();
                let now = Instant::now();
                let mut expired = Vec::new();
                while let Some(front) = pending.front() {
                    if front.deadline <= now {
                        // Unwrap is safe: front() just confirmed the entry.
                        expired.push(pending.pop_front().unwrap());
                    } else {
                        break;
                    }
                }
                expired
            };
            for entry in expired {
                warn!(action = %entry.command.action, "queued navigation timed out");
                let _ = entry.done.send(false);
            }

            if self.is_ready() {
                loop {
                    let next = self.inner.pending.lock().unwrap().pop_front();
                    match next {
                        Some(entry) => {
                            let result = self.execute(&entry.command);
                            let _ = entry.done.send(result);
                        }
                        None => break,
                    }
                }
            }

            if self.inner.pending.lock().unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(self.inner.config.poll_interval).await;
        }
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("ready", &self.is_ready())
            .field("pending", &self.inner.pending.lock().unwrap().len())
            .finish()
    }
}

/// Timestamp plus random suffix, monotonically increasing per process.
fn command_id(timestamp: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", timestamp.timestamp_millis(), &suffix[..8])
}
