//! Recording [`AnalyticsSink`] mock.

use std::sync::Mutex;

use serde_json::Value;

use crate::traits::AnalyticsSink;

/// Sink that records every event for later assertions.
#[derive(Default)]
pub struct RecordingAnalyticsSink {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingAnalyticsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, in order.
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap().clone()
    }
}

impl AnalyticsSink for RecordingAnalyticsSink {
    fn track_event(&self, name: &str, properties: &Value) {
        self.events
            .lock()
            .unwrap()
            .push((name.to_string(), properties.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_events_in_order() {
        let sink = RecordingAnalyticsSink::new();
        sink.track_event("first", &json!({"n": 1}));
        sink.track_event("second", &json!({"n": 2}));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "first");
        assert_eq!(events[1].1["n"], 2);
    }
}
