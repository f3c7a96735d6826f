//! footprint: command-line driver for visitor identity tracking.
//!
//! Runs the tracker against a file-backed store so the identity and visit
//! lifecycle can be exercised outside a browser. Each invocation is one
//! "page"; the data root plays the role of the browser profile.
//!
//! ## Subcommands
//!
//! - `activate`: One page activation, prints dispatched events
//! - `tick`: Fire the engagement check for the stored visit
//! - `show`: Print the stored identity record
//! - `set-data` / `delete-data`: Edit custom data on the stored record
//! - `send`: Dispatch a caller-named event

mod activate;
mod armed;
mod context;
mod data;
mod logging;
mod send;
mod tick;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use activate::ActivateArgs;
use context::Context;

#[derive(Parser)]
#[command(name = "footprint")]
#[command(about = "Visitor identity and visit tracker")]
#[command(version)]
struct Cli {
    /// Data directory holding the record, cookies, config and logs (default: ~/.footprint)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Tracker config file, TOML or JSON by extension (default: <root>/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Activate on a page URL and print dispatched events as JSON lines
    Activate {
        /// Current page URL
        #[arg(long)]
        url: String,

        /// Referring page URL
        #[arg(long, default_value = "")]
        referrer: String,

        /// User agent used for device classification
        #[arg(long, default_value = "")]
        user_agent: String,

        /// Report an ad blocker as present (only surfaced when detectAdBlock is on)
        #[arg(long)]
        adblock: bool,

        /// Stay up until deferred tasks (engagement, vitals) have fired
        #[arg(long)]
        wait: bool,
    },

    /// Run engagement checks armed by `activate` whose delay has elapsed
    Tick,

    /// Print the stored identity record (or null)
    Show,

    /// Set a custom data entry on the stored record
    SetData {
        #[arg(value_name = "KEY")]
        key: String,

        /// Value as JSON (quote strings: '"gold"')
        #[arg(value_name = "JSON")]
        value: String,
    },

    /// Remove a custom data entry from the stored record
    DeleteData {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Dispatch a custom event
    Send {
        #[arg(value_name = "EVENT")]
        event: String,

        /// Event payload as a JSON object
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let root = match cli.root {
        Some(root) => root,
        None => match context::default_root() {
            Ok(root) => root,
            Err(e) => {
                eprintln!("footprint: {}", e);
                std::process::exit(1);
            }
        },
    };
    let _logging_guard = logging::init(&root);

    if let Err(e) = run(root, cli.config, cli.command) {
        tracing::error!(error = %e, "footprint failed");
        std::process::exit(1);
    }
}

fn run(root: PathBuf, config: Option<PathBuf>, command: Commands) -> context::CliResult<()> {
    let ctx = Context::load(root, config.as_deref())?;

    match command {
        Commands::Activate {
            url,
            referrer,
            user_agent,
            adblock,
            wait,
        } => activate::run(
            &ctx,
            ActivateArgs {
                url,
                referrer,
                user_agent,
                adblock,
                wait,
            },
        ),
        Commands::Tick => tick::run(&ctx),
        Commands::Show => data::show(&ctx),
        Commands::SetData { key, value } => data::set(&ctx, &key, &value),
        Commands::DeleteData { key } => data::delete(&ctx, &key),
        Commands::Send { event, payload } => send::run(&ctx, &event, payload.as_deref()),
    }
}
