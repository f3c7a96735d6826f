//! Record inspection and custom-data edits.

use footprint_core::Tracker;

use crate::context::{parse_json, CliError, CliResult, Context};

pub fn show(ctx: &Context) -> CliResult<()> {
    let tracker = ctx.attach()?;
    let value = serde_json::to_value(tracker.record()).map_err(|source| CliError::InvalidJson {
        what: "identity record".to_string(),
        source,
    })?;
    println!("{:#}", value);
    Ok(())
}

pub fn set(ctx: &Context, key: &str, raw_value: &str) -> CliResult<()> {
    let value = parse_json("value", raw_value)?;
    let mut tracker = attach_existing(ctx)?;
    tracker.set_custom_data(key, value);
    Ok(())
}

pub fn delete(ctx: &Context, key: &str) -> CliResult<()> {
    let mut tracker = attach_existing(ctx)?;
    tracker.delete_custom_data(key);
    Ok(())
}

fn attach_existing(ctx: &Context) -> CliResult<Tracker> {
    let tracker = ctx.attach()?;
    if tracker.record().is_none() {
        return Err(CliError::NoRecord(ctx.root.clone()));
    }
    Ok(tracker)
}
