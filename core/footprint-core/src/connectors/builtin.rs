//! Built-in connectors: generic event queue, tag-manager call, diagnostic log.

use std::sync::{Arc, RwLock};

use footprint_protocol::{EventEnvelope, TagCall};
use serde_json::Value;

use super::Connector;

/// Names accepted in the `connectors` config list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltInConnector {
    DataLayer,
    Gtag,
    Console,
}

impl BuiltInConnector {
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("dataLayer") {
            Some(BuiltInConnector::DataLayer)
        } else if name.eq_ignore_ascii_case("gtag") {
            Some(BuiltInConnector::Gtag)
        } else if name.eq_ignore_ascii_case("console") {
            Some(BuiltInConnector::Console)
        } else {
            None
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            BuiltInConnector::DataLayer => "dataLayer",
            BuiltInConnector::Gtag => "gtag",
            BuiltInConnector::Console => "console",
        }
    }

    pub fn create(&self, sinks: &ConnectorSinks) -> Arc<dyn Connector> {
        match self {
            BuiltInConnector::DataLayer => Arc::new(DataLayerConnector::new(sinks.data_layer.clone())),
            BuiltInConnector::Gtag => Arc::new(GtagConnector::new(sinks.tag_calls.clone())),
            BuiltInConnector::Console => Arc::new(ConsoleConnector),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Shared Sinks
// ═══════════════════════════════════════════════════════════════════════════════

/// The generic event queue (`window.dataLayer`-like). Cloning shares the queue.
#[derive(Debug, Clone, Default)]
pub struct DataLayer {
    entries: Arc<RwLock<Vec<Value>>>,
}

impl DataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: Value) {
        // Recover from poisoning - the queue is append-only
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .filter_map(|entry| entry.get("event").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns everything queued so far.
    pub fn drain(&self) -> Vec<Value> {
        std::mem::take(
            &mut *self
                .entries
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

/// Log of tag-manager calls (`gtag('event', name, params)`-like).
#[derive(Debug, Clone, Default)]
pub struct TagCallLog {
    calls: Arc<RwLock<Vec<TagCall>>>,
}

impl TagCallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: TagCall) {
        self.calls
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }

    pub fn snapshot(&self) -> Vec<TagCall> {
        self.calls
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Sinks that built-in connectors write into; owned by the tracker.
#[derive(Debug, Clone, Default)]
pub struct ConnectorSinks {
    pub data_layer: DataLayer,
    pub tag_calls: TagCallLog,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Connectors
// ═══════════════════════════════════════════════════════════════════════════════

pub struct DataLayerConnector {
    queue: DataLayer,
}

impl DataLayerConnector {
    pub fn new(queue: DataLayer) -> Self {
        Self { queue }
    }
}

impl Connector for DataLayerConnector {
    fn id(&self) -> &str {
        BuiltInConnector::DataLayer.id()
    }

    fn send(&self, event: &EventEnvelope) -> Result<(), String> {
        self.queue.push(event.to_value());
        Ok(())
    }
}

pub struct GtagConnector {
    log: TagCallLog,
}

impl GtagConnector {
    pub fn new(log: TagCallLog) -> Self {
        Self { log }
    }
}

impl Connector for GtagConnector {
    fn id(&self) -> &str {
        BuiltInConnector::Gtag.id()
    }

    fn send(&self, event: &EventEnvelope) -> Result<(), String> {
        self.log.record(TagCall::event(event));
        Ok(())
    }
}

/// Writes each envelope to the diagnostic log.
pub struct ConsoleConnector;

impl Connector for ConsoleConnector {
    fn id(&self) -> &str {
        BuiltInConnector::Console.id()
    }

    fn send(&self, event: &EventEnvelope) -> Result<(), String> {
        let payload = serde_json::to_string(&event.payload).map_err(|e| e.to_string())?;
        tracing::info!(event = %event.event, payload = %payload, "footprint event");
        Ok(())
    }
}
