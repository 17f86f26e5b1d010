//! Platform connectivity probe trait abstraction.

use async_trait::async_trait;

/// A connectivity snapshot from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkState {
    /// Whether a link-layer connection exists.
    pub is_connected: bool,
    /// Whether the internet is actually reachable over that link.
    pub is_internet_reachable: bool,
}

impl LinkState {
    pub fn online() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: true,
        }
    }

    pub fn offline() -> Self {
        Self::default()
    }

    /// Usable connectivity requires both a connection and reachability.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable
    }
}

/// Callback invoked on connectivity changes.
pub type LinkListener = Box<dyn Fn(LinkState) + Send + Sync>;

/// Guard for a probe subscription; dropping it unsubscribes.
pub struct ProbeSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ProbeSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription that needs no teardown.
    pub fn noop() -> Self {
        Self { cancel: None }
    }
}

impl Drop for ProbeSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for ProbeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Trait for the platform connectivity probe.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Query the current link state.
    async fn fetch(&self) -> LinkState;

    /// Subscribe to link-state changes.
    fn subscribe(&self, listener: LinkListener) -> ProbeSubscription;
}
