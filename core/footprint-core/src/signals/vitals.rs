//! Web-vitals summary: samples collected from the host's metric library,
//! reported once per activation (delay task or page-hide, whichever is first).

use std::collections::BTreeMap;

use footprint_protocol::{EventEnvelope, WEB_VITALS};
use serde_json::{Map, Value};

#[derive(Debug, Default, Clone)]
pub struct VitalsCollector {
    metrics: BTreeMap<String, f64>,
    emitted: bool,
}

impl VitalsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest value per metric wins. Non-finite values are ignored.
    pub fn record(&mut self, name: &str, value: f64) {
        if !value.is_finite() {
            tracing::debug!(metric = name, "Ignoring non-finite vital");
            return;
        }
        self.metrics.insert(name.to_string(), value);
    }

    /// Produces the summary event the first time it is called, then `None`.
    pub fn summarize(&mut self) -> Option<EventEnvelope> {
        if self.emitted {
            return None;
        }
        self.emitted = true;

        let metrics: Map<String, Value> = self
            .metrics
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(*value)))
            .collect();
        Some(EventEnvelope::new(WEB_VITALS).field("metrics", Value::Object(metrics)))
    }

    pub fn is_emitted(&self) -> bool {
        self.emitted
    }
}
