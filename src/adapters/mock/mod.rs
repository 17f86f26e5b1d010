//! Mock implementations of every collaborator trait.
//!
//! Each mock exposes failure switches and call counters so tests can script
//! exact service behavior and assert on interaction counts.

pub mod analytics;
pub mod connectivity;
pub mod identity;
pub mod navigation;
pub mod storage;

pub use analytics::RecordingAnalyticsSink;
pub use connectivity::MockConnectivityProbe;
pub use identity::MockIdentityApi;
pub use navigation::MockNavigationSurface;
pub use storage::InMemoryUserStore;
