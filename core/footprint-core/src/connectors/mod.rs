//! Connector interfaces: sinks that receive dispatched event envelopes.
//! Add new built-ins in `builtin.rs` and to [`BuiltInConnector`] so configs can name them.

mod builtin;
mod dispatcher;

use std::fmt;
use std::sync::Arc;

use footprint_protocol::EventEnvelope;
use serde::{Deserialize, Deserializer};

pub use builtin::{
    BuiltInConnector, ConnectorSinks, ConsoleConnector, DataLayer, DataLayerConnector,
    GtagConnector, TagCallLog,
};
pub use dispatcher::{DispatchReport, Dispatcher};

/// Trait for analytics sinks.
///
/// Implementors should:
/// - Return `Err` rather than panic; the dispatcher survives both, but errors log cleanly
/// - Not block; delivery is best-effort and there is no retry
pub trait Connector: Send + Sync {
    /// Identifier used in diagnostics (e.g., "dataLayer", "gtag")
    fn id(&self) -> &str;

    fn send(&self, event: &EventEnvelope) -> Result<(), String>;
}

type SendFn = dyn Fn(&EventEnvelope) -> Result<(), String> + Send + Sync;

/// Adapts a caller-supplied function into a [`Connector`].
pub struct FnConnector {
    id: String,
    send: Box<SendFn>,
}

impl FnConnector {
    pub fn new<F>(id: impl Into<String>, send: F) -> Self
    where
        F: Fn(&EventEnvelope) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            send: Box::new(send),
        }
    }
}

impl Connector for FnConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, event: &EventEnvelope) -> Result<(), String> {
        (self.send)(event)
    }
}

/// A configured connector: a built-in referenced by name, or a caller's own.
///
/// Resolved once, when the tracker is built, into a uniform connector list.
#[derive(Clone)]
pub enum ConnectorSpec {
    BuiltIn(String),
    Custom(Arc<dyn Connector>),
}

impl ConnectorSpec {
    pub fn built_in(name: impl Into<String>) -> Self {
        ConnectorSpec::BuiltIn(name.into())
    }

    pub fn custom<F>(id: impl Into<String>, send: F) -> Self
    where
        F: Fn(&EventEnvelope) -> Result<(), String> + Send + Sync + 'static,
    {
        ConnectorSpec::Custom(Arc::new(FnConnector::new(id, send)))
    }

    pub fn name(&self) -> &str {
        match self {
            ConnectorSpec::BuiltIn(name) => name,
            ConnectorSpec::Custom(connector) => connector.id(),
        }
    }
}

impl fmt::Debug for ConnectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorSpec::BuiltIn(name) => f.debug_tuple("BuiltIn").field(name).finish(),
            ConnectorSpec::Custom(connector) => {
                f.debug_tuple("Custom").field(&connector.id()).finish()
            }
        }
    }
}

// Config files can only name built-ins
impl<'de> Deserialize<'de> for ConnectorSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(ConnectorSpec::BuiltIn)
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use std::sync::Mutex;

    /// Records every event it receives.
    pub struct RecordingConnector {
        pub id: &'static str,
        pub events: Mutex<Vec<EventEnvelope>>,
    }

    impl RecordingConnector {
        pub fn new(id: &'static str) -> Self {
            Self {
                id,
                events: Mutex::new(vec![]),
            }
        }

        pub fn names(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.event.clone())
                .collect()
        }
    }

    impl Connector for RecordingConnector {
        fn id(&self) -> &str {
            self.id
        }

        fn send(&self, event: &EventEnvelope) -> Result<(), String> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// Fails every send, by error or by panic.
    pub struct FailingConnector {
        pub panics: bool,
    }

    impl Connector for FailingConnector {
        fn id(&self) -> &str {
            if self.panics {
                "panicking"
            } else {
                "failing"
            }
        }

        fn send(&self, _event: &EventEnvelope) -> Result<(), String> {
            if self.panics {
                panic!("connector exploded");
            }
            Err("sink unreachable".to_string())
        }
    }
}
