//! Scriptable [`NavigationSurface`] mock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::traits::{NavCommand, NavigationSurface};

/// Mock surface recording every dispatched command.
///
/// Starts not ready so readiness-queue tests control mounting explicitly;
/// `can_go_back` defaults to `true`.
pub struct MockNavigationSurface {
    ready: AtomicBool,
    can_go_back: AtomicBool,
    current_route: Mutex<Option<String>>,
    dispatched: Mutex<Vec<NavCommand>>,
}

impl Default for MockNavigationSurface {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(false),
            can_go_back: AtomicBool::new(true),
            current_route: Mutex::new(None),
            dispatched: Mutex::new(Vec::new()),
        }
    }
}

impl MockNavigationSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_can_go_back(&self, can: bool) {
        self.can_go_back.store(can, Ordering::SeqCst);
    }

    pub fn set_current_route(&self, route: Option<String>) {
        *self.current_route.lock().unwrap() = route;
    }

    /// Every command dispatched so far, in order.
    pub fn dispatched(&self) -> Vec<NavCommand> {
        self.dispatched.lock().unwrap().clone()
    }
}

impl NavigationSurface for MockNavigationSurface {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn dispatch(&self, command: &NavCommand) {
        if let Some(route) = &command.route {
            *self.current_route.lock().unwrap() = Some(route.clone());
        }
        self.dispatched.lock().unwrap().push(command.clone());
    }

    fn current_route(&self) -> Option<String> {
        self.current_route.lock().unwrap().clone()
    }

    fn can_go_back(&self) -> bool {
        self.can_go_back.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_commands_and_tracks_route() {
        let surface = MockNavigationSurface::new();
        assert!(!surface.is_ready());

        surface.set_ready(true);
        surface.dispatch(&NavCommand::navigate("Home", json!({})));
        surface.dispatch(&NavCommand::go_back());

        let commands = surface.dispatched();
        assert_eq!(commands.len(), 2);
        assert_eq!(surface.current_route().as_deref(), Some("Home"));
    }
}
