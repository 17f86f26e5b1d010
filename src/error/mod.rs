//! Error taxonomy and failure reporting.
//!
//! This module provides the failure-handling backbone the rest of the core
//! funnels into:
//!
//! - **[`ErrorCategory`]**: high-level classification with keyword-based
//!   derivation for uncategorized failures
//! - **[`AuthFailure`]**: the reason taxonomy returned by the token and
//!   session layers, with a fixed user-message table
//! - **[`ErrorReporter`]**: bounded, sanitizing, rate-limited log facility
//!   with optional analytics forwarding

mod category;
mod failure;
mod reporter;

pub use category::ErrorCategory;
pub use failure::AuthFailure;
pub use reporter::{
    ErrorLogEntry, ErrorReporter, ReporterConfig, ReporterStats, ToastKind,
};
