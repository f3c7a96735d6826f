//! Persisted record types for visitor identity and visits.
//!
//! The serialized form is camelCase JSON with epoch-millisecond timestamps:
//!
//! ```json
//! {
//!   "id": "01J...",
//!   "expirationDate": 1767225600000,
//!   "lastActivity": 1733529600000,
//!   "landingPage": "https://shop.example/?utm_source=news",
//!   "source": { "utm_source": "news" },
//!   "customData": {},
//!   "visit": {
//!     "id": "01J...",
//!     "expirationDate": 1733531400000,
//!     "landingPage": "https://shop.example/?utm_source=news",
//!     "source": { "utm_source": "news" },
//!     "count": 1,
//!     "isEngaged": false
//!   }
//! }
//! ```
//!
//! Unknown top-level keys on either record are kept in `extra`, which is how the
//! public field API stores caller-defined fields.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Attribution snapshot: campaign parameters and/or `referrer`.
pub type SourceMap = BTreeMap<String, String>;

/// Key holding the external referrer inside a [`SourceMap`].
pub const REFERRER_KEY: &str = "referrer";

/// Per-visitor state, long-lived (months).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: String,
    pub expiration_date: i64,
    pub last_activity: i64,
    pub landing_page: String,
    #[serde(default)]
    pub source: SourceMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_data: Map<String, Value>,
    /// Missing or malformed visits read back as `None` so the user survives and
    /// the visit is rolled over on the next activation.
    #[serde(default, deserialize_with = "lenient_visit")]
    pub visit: Option<VisitRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-visit state nested in the identity record, short-lived (minutes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    pub id: String,
    pub expiration_date: i64,
    pub landing_page: String,
    #[serde(default)]
    pub source: SourceMap,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub is_engaged: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdentityRecord {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiration_date < now_ms
    }

    pub fn visit_id(&self) -> Option<&str> {
        self.visit.as_ref().map(|v| v.id.as_str())
    }
}

impl VisitRecord {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiration_date < now_ms
    }
}

fn lenient_visit<'de, D>(deserializer: D) -> Result<Option<VisitRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Record Kinds (public field API)
// ═══════════════════════════════════════════════════════════════════════════════

/// The two record levels that accept caller-defined fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    User,
    Visit,
}

impl RecordKind {
    /// Serialized names owned by the tracker; callers may not add or delete them.
    pub fn reserved_fields(&self) -> &'static [&'static str] {
        match self {
            RecordKind::User => &[
                "id",
                "expirationDate",
                "lastActivity",
                "landingPage",
                "source",
                "customData",
                "visit",
            ],
            RecordKind::Visit => &[
                "id",
                "expirationDate",
                "landingPage",
                "source",
                "count",
                "isEngaged",
            ],
        }
    }

    pub fn is_reserved(&self, field: &str) -> bool {
        self.reserved_fields().contains(&field)
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "user" => Some(RecordKind::User),
            "visit" => Some(RecordKind::Visit),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::User => write!(f, "user"),
            RecordKind::Visit => write!(f, "visit"),
        }
    }
}
