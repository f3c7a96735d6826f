//! Event envelope and cookie payload types for footprint.
//!
//! This crate is shared by the tracker core, its connectors, and tooling that
//! consumes dispatched events, so every side agrees on the wire shape.
//!
//! An envelope serializes flat, with the event name under `event`:
//!
//! ```json
//! { "event": "visit_engaged", "visit": { "isEngaged": true } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PAGE_LOAD: &str = "page_load";
pub const FIRST_VISIT: &str = "first_visit";
pub const VISIT_START: &str = "visit_start";
pub const VISIT_ENGAGED: &str = "visit_engaged";
pub const NEW_VISIT_SOURCE: &str = "new_visit_source";
pub const SCROLL_DEPTH: &str = "scroll_depth";
pub const JS_ERROR: &str = "js_error";
pub const VIRTUAL_PAGE_VIEW: &str = "virtual_page_view";
pub const WEB_VITALS: &str = "web_vitals";

/// Key under which the event name is carried in a serialized envelope.
pub const EVENT_KEY: &str = "event";

/// A single event handed to connectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl EventEnvelope {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload: Map::new(),
        }
    }

    /// Builds an envelope from a caller-supplied payload.
    ///
    /// A payload key named `event` is dropped so callers cannot rename the event.
    pub fn with_payload(event: impl Into<String>, mut payload: Map<String, Value>) -> Self {
        payload.remove(EVENT_KEY);
        Self {
            event: event.into(),
            payload,
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != EVENT_KEY {
            self.payload.insert(key, value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Serializes the envelope to its flat JSON object form.
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.payload.len() + 1);
        object.insert(EVENT_KEY.to_string(), Value::String(self.event.clone()));
        for (key, value) in &self.payload {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// The small identity pair mirrored into the HTTP-visible cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookiePayload {
    pub user_id: String,
    pub visit_id: String,
}

/// A tag-manager style call: `(command, name, params)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCall {
    pub command: String,
    pub name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl TagCall {
    pub fn event(envelope: &EventEnvelope) -> Self {
        Self {
            command: "event".to_string(),
            name: envelope.event.clone(),
            params: envelope.payload.clone(),
        }
    }
}
