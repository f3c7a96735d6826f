//! Uncaught error and unhandled rejection capture, deduplicated per page.

use std::collections::HashSet;

use footprint_protocol::{EventEnvelope, JS_ERROR};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Distinct errors remembered per activation; later new errors are dropped.
pub const MAX_TRACKED_ERRORS: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[default]
    Error,
    UnhandledRejection,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Error => "error",
            ErrorKind::UnhandledRejection => "unhandled_rejection",
        }
    }
}

/// What the host's error hook saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ErrorReport {
    pub message: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    pub kind: ErrorKind,
}

impl ErrorReport {
    /// Hash of every identifying field, so repeats of the same error collapse.
    pub fn fingerprint(&self) -> String {
        let line = self.line.map(|l| l.to_string()).unwrap_or_default();
        let column = self.column.map(|c| c.to_string()).unwrap_or_default();
        let composite = [
            self.message.as_str(),
            self.source.as_deref().unwrap_or_default(),
            self.stack.as_deref().unwrap_or_default(),
            line.as_str(),
            column.as_str(),
            self.kind.as_str(),
        ]
        .join("|");
        format!("{:x}", md5::compute(composite))
    }
}

#[derive(Debug, Default)]
pub struct ErrorTracker {
    seen: HashSet<String>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a `js_error` event the first time an error is seen.
    pub fn capture(&mut self, report: &ErrorReport) -> Option<EventEnvelope> {
        let fingerprint = report.fingerprint();
        if self.seen.contains(&fingerprint) {
            return None;
        }
        if self.seen.len() >= MAX_TRACKED_ERRORS {
            tracing::debug!("Error capture limit reached; dropping error");
            return None;
        }
        self.seen.insert(fingerprint);

        Some(
            EventEnvelope::new(JS_ERROR)
                .field("message", report.message.clone())
                .field("source", opt(report.source.clone()))
                .field("stack", opt(report.stack.clone()))
                .field("line", report.line.map(Value::from).unwrap_or(Value::Null))
                .field("column", report.column.map(Value::from).unwrap_or(Value::Null))
                .field("kind", report.kind.as_str()),
        )
    }

    pub fn distinct_errors(&self) -> usize {
        self.seen.len()
    }
}

fn opt(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(message: &str, line: u32) -> ErrorReport {
        ErrorReport {
            message: message.to_string(),
            source: Some("https://shop.example/app.js".to_string()),
            stack: Some("at render (app.js:10:5)".to_string()),
            line: Some(line),
            column: Some(5),
            kind: ErrorKind::Error,
        }
    }

    #[test]
    fn test_identical_errors_emit_once() {
        let mut tracker = ErrorTracker::new();
        assert!(tracker.capture(&report("boom", 10)).is_some());
        assert!(tracker.capture(&report("boom", 10)).is_none());
        assert_eq!(tracker.distinct_errors(), 1);
    }

    #[test]
    fn test_any_field_change_is_a_new_error() {
        let mut tracker = ErrorTracker::new();
        assert!(tracker.capture(&report("boom", 10)).is_some());
        assert!(tracker.capture(&report("boom", 11)).is_some());

        let mut rejection = report("boom", 10);
        rejection.kind = ErrorKind::UnhandledRejection;
        assert!(tracker.capture(&rejection).is_some());
        assert_eq!(tracker.distinct_errors(), 3);
    }

    #[test]
    fn test_event_payload() {
        let mut tracker = ErrorTracker::new();
        let event = tracker
            .capture(&ErrorReport {
                message: "nope".to_string(),
                kind: ErrorKind::UnhandledRejection,
                ..ErrorReport::default()
            })
            .unwrap();
        assert_eq!(
            event.to_value(),
            json!({
                "event": "js_error",
                "message": "nope",
                "source": null,
                "stack": null,
                "line": null,
                "column": null,
                "kind": "unhandled_rejection"
            })
        );
    }

    #[test]
    fn test_capture_limit() {
        let mut tracker = ErrorTracker::new();
        for i in 0..MAX_TRACKED_ERRORS {
            assert!(tracker.capture(&report(&format!("e{}", i), 1)).is_some());
        }
        assert!(tracker.capture(&report("one too many", 1)).is_none());
        assert_eq!(tracker.distinct_errors(), MAX_TRACKED_ERRORS);
    }

    #[test]
    fn test_report_parses_from_host_json() {
        let parsed: ErrorReport = serde_json::from_value(json!({
            "message": "x",
            "kind": "unhandled_rejection"
        }))
        .unwrap();
        assert_eq!(parsed.kind, ErrorKind::UnhandledRejection);
        assert_eq!(parsed.line, None);
    }

    #[test]
    fn test_default_report_is_plain_error() {
        let report = ErrorReport::default();
        assert_eq!(report.kind, ErrorKind::Error);
        assert_eq!(report.kind.as_str(), "error");
    }
}
