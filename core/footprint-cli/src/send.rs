//! Dispatches a caller-named event through the configured connectors.

use serde_json::Map;

use crate::context::{parse_json, print_events, CliError, CliResult, Context};

pub fn run(ctx: &Context, event: &str, payload: Option<&str>) -> CliResult<()> {
    let payload = match payload {
        Some(raw) => match parse_json("payload", raw)? {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(CliError::NotAnObject {
                    what: "payload".to_string(),
                })
            }
        },
        None => Map::new(),
    };

    let tracker = ctx.attach()?;
    let report = tracker.send_event(event, payload);
    if !report.failed.is_empty() {
        tracing::warn!(event, failed = ?report.failed, "Some connectors failed");
    }
    print_events(&tracker);
    Ok(())
}
