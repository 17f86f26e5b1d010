//! Analytics sink trait abstraction.

use serde_json::Value;

/// Optional sink the error reporter forwards failure events to.
///
/// Implementations must be fire-and-forget: the reporter never awaits
/// delivery and a slow sink must not stall logging.
pub trait AnalyticsSink: Send + Sync {
    fn track_event(&self, name: &str, properties: &Value);
}
