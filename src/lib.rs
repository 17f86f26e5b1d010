//! Casa core - session and connectivity resilience for the Casa client
//!
//! Owns the authentication state machine, token lifecycle, navigation
//! readiness queue, connectivity-aware retries, and error reporting. All
//! platform collaborators are consumed through the traits in [`traits`], so
//! every module runs unmodified against the mocks in [`adapters::mock`].

pub mod adapters;
pub mod error;
pub mod navigation;
pub mod net;
pub mod session;
pub mod token;
pub mod traits;

pub use error::{AuthFailure, ErrorCategory, ErrorReporter, ReporterConfig};
pub use navigation::{NavigateOptions, Navigator, NavigatorConfig};
pub use net::{ConnectivityMonitor, RetryConfig, RetryError};
pub use session::{AuthPhase, Credentials, SessionConfig, SessionManager, SessionState, UserProfile};
pub use token::{RefreshOutcome, RefreshScheduler, TokenConfig, TokenManager, Validation};
