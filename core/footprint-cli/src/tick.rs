//! Runs engagement checks whose delay has elapsed, as the page timer would have.
//!
//! Checks that are not yet due stay armed. A due check is dropped once run,
//! whether or not it promoted anything: its visit may have been superseded or
//! may have expired in the meantime.

use footprint_core::{Clock, SystemClock};

use crate::armed::{self, ArmedCheck};
use crate::context::{print_events, CliError, CliResult, Context};

pub fn run(ctx: &Context) -> CliResult<()> {
    run_at(ctx, SystemClock.now_ms())
}

fn run_at(ctx: &Context, now_ms: i64) -> CliResult<()> {
    let mut tracker = ctx.attach()?;
    if tracker.record().is_none() {
        return Err(CliError::NoRecord(ctx.root.clone()));
    }

    let path = ctx.armed_checks_path();
    let (due, waiting): (Vec<ArmedCheck>, Vec<ArmedCheck>) = armed::load(&path)
        .into_iter()
        .partition(|check| check.due_at <= now_ms);

    if due.is_empty() {
        tracing::info!(waiting = waiting.len(), "No engagement check due");
    }

    for check in &due {
        let expired = tracker
            .record()
            .and_then(|record| record.visit)
            .is_some_and(|visit| visit.id == check.visit_id && visit.is_expired(now_ms));
        if expired {
            tracing::info!(visit_id = %check.visit_id, "Visit expired before tick, not promoted");
            continue;
        }
        tracker.check_engagement(&check.visit_id);
    }

    armed::save(&path, &waiting)?;
    print_events(&tracker);
    Ok(())
}
