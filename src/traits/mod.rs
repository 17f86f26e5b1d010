//! Trait abstractions for the core's external collaborators.
//!
//! The resilience core consumes its environment exclusively through these
//! seams, enabling dependency injection and mocking in tests.
//!
//! # Traits
//!
//! - [`UserStore`] - persistent session storage
//! - [`IdentityApi`] - profile lookup and token refresh
//! - [`ConnectivityProbe`] - platform link-state queries
//! - [`NavigationSurface`] - the mounted presentation surface
//! - [`AnalyticsSink`] - failure-event reporting backend

pub mod analytics;
pub mod connectivity;
pub mod identity;
pub mod navigation;
pub mod storage;

pub use analytics::AnalyticsSink;
pub use connectivity::{ConnectivityProbe, LinkListener, LinkState, ProbeSubscription};
pub use identity::{IdentityApi, IdentityError, TokenSet};
pub use navigation::{NavAction, NavCommand, NavigationSurface};
pub use storage::{StorageError, StoredUser, UserStore};
