//! One page activation against the file-backed store.
//!
//! ## Usage
//!
//! ```bash
//! footprint activate --url 'https://shop.example/?utm_source=news' --wait
//! ```
//!
//! Prints every dispatched envelope as a JSON line. With `--wait` the process
//! stays up until pending deferred tasks (engagement check, vitals summary)
//! have fired. Without it, an armed engagement check is saved for `tick`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use footprint_core::{Clock, FixedProbe, StaticEnvironment, SystemClock, Tracker};

use crate::armed;
use crate::context::{print_events, CliResult, Context};

pub struct ActivateArgs {
    pub url: String,
    pub referrer: String,
    pub user_agent: String,
    pub adblock: bool,
    pub wait: bool,
}

pub fn run(ctx: &Context, args: ActivateArgs) -> CliResult<()> {
    let environment = Arc::new(
        StaticEnvironment::new(args.url)
            .with_referrer(args.referrer)
            .with_user_agent(args.user_agent),
    );
    let caps = ctx
        .capabilities(environment)
        .with_ad_block_probe(Arc::new(FixedProbe(args.adblock)));

    let mut tracker = Tracker::init(ctx.config.clone(), caps)?;
    print_events(&tracker);

    if args.wait {
        drain_deferred(&mut tracker);
    }

    let path = ctx.armed_checks_path();
    let fresh = armed::pending_in(&tracker);
    if !fresh.is_empty() {
        armed::save(&path, &armed::merge(armed::load(&path), fresh))?;
    }
    Ok(())
}

fn drain_deferred(tracker: &mut Tracker) {
    while let Some(due_at) = tracker.next_task_due() {
        let remaining = due_at.saturating_sub(SystemClock.now_ms()).max(0);
        tracing::debug!(remaining_ms = remaining, "Waiting for deferred task");
        thread::sleep(Duration::from_millis(remaining as u64));
        tracker.run_due_tasks();
        print_events(tracker);
    }
}
