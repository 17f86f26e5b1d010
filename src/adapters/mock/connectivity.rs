//! Scriptable [`ConnectivityProbe`] mock.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::traits::{ConnectivityProbe, LinkListener, LinkState, ProbeSubscription};

/// Mock probe with a settable link state and a fetch counter.
///
/// Listeners registered through `subscribe` are invoked synchronously on
/// every [`set_state`](MockConnectivityProbe::set_state).
pub struct MockConnectivityProbe {
    state: Mutex<LinkState>,
    fetch_count: AtomicU32,
    listeners: Arc<Mutex<Vec<(u64, LinkListener)>>>,
    listener_seq: AtomicU64,
}

impl MockConnectivityProbe {
    pub fn new(state: LinkState) -> Self {
        Self {
            state: Mutex::new(state),
            fetch_count: AtomicU32::new(0),
            listeners: Arc::new(Mutex::new(Vec::new())),
            listener_seq: AtomicU64::new(0),
        }
    }

    /// Change the link state and notify subscribers.
    pub fn set_state(&self, state: LinkState) {
        *self.state.lock().unwrap() = state;
        for (_, listener) in self.listeners.lock().unwrap().iter() {
            listener(state);
        }
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

#[async_trait]
impl ConnectivityProbe for MockConnectivityProbe {
    async fn fetch(&self) -> LinkState {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap()
    }

    fn subscribe(&self, listener: LinkListener) -> ProbeSubscription {
        let id = self.listener_seq.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().push((id, listener));

        let listeners = self.listeners.clone();
        ProbeSubscription::new(move || {
            listeners.lock().unwrap().retain(|(lid, _)| *lid != id);
        })
    }
}
