//! Shared CLI plumbing: data root, config, file-backed capabilities, output.
//!
//! Layout under the data root (default `~/.footprint`):
//!
//! ```text
//! userActivity.json   identity record
//! cookies.json        cookie jar
//! armed.json          engagement checks waiting for `tick`
//! config.toml         optional tracker config
//! logs/               daily-rolling log files
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use footprint_core::{
    BuiltInConnector, Capabilities, ConnectorSpec, FileCookieJar, FileStore, FootprintError,
    StaticEnvironment, Tracker, TrackerConfig,
};
use thiserror::Error;

const ROOT_DIR_NAME: &str = ".footprint";
const COOKIE_JAR_FILE: &str = "cookies.json";
const ARMED_CHECKS_FILE: &str = "armed.json";
const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Tracker(#[from] FootprintError),

    #[error("Home directory not found")]
    NoHomeDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON for {what}: {source}")]
    InvalidJson {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{what} must be a JSON object")]
    NotAnObject { what: String },

    #[error("No identity record under {0}; run `footprint activate` first")]
    NoRecord(PathBuf),
}

pub type CliResult<T> = std::result::Result<T, CliError>;

pub fn default_root() -> CliResult<PathBuf> {
    let home = dirs::home_dir().ok_or(CliError::NoHomeDir)?;
    Ok(home.join(ROOT_DIR_NAME))
}

pub struct Context {
    pub root: PathBuf,
    pub config: TrackerConfig,
}

impl Context {
    /// Loads `--config`, or `<root>/config.toml` when present, else defaults.
    pub fn load(root: PathBuf, config_path: Option<&Path>) -> CliResult<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE));
        let config = ensure_data_layer(TrackerConfig::load(&path)?);
        tracing::debug!(root = %root.display(), config = %path.display(), "CLI context ready");
        Ok(Self { root, config })
    }

    pub fn capabilities(&self, environment: Arc<StaticEnvironment>) -> Capabilities {
        Capabilities::new(
            environment,
            Arc::new(FileStore::new(&self.root)),
            Arc::new(FileCookieJar::new(self.root.join(COOKIE_JAR_FILE))),
        )
    }

    pub fn armed_checks_path(&self) -> PathBuf {
        self.root.join(ARMED_CHECKS_FILE)
    }

    /// A tracker over the stored state, without running an activation.
    pub fn attach(&self) -> CliResult<Tracker> {
        let environment = Arc::new(StaticEnvironment::new(""));
        Ok(Tracker::attach(
            self.config.clone(),
            self.capabilities(environment),
        )?)
    }
}

/// Output is read back from the dataLayer queue, so it is always configured.
fn ensure_data_layer(config: TrackerConfig) -> TrackerConfig {
    let present = config.connectors.iter().any(|spec| {
        matches!(spec, ConnectorSpec::BuiltIn(name)
            if BuiltInConnector::from_name(name) == Some(BuiltInConnector::DataLayer))
    });
    if present {
        config
    } else {
        config.with_connector(ConnectorSpec::built_in(BuiltInConnector::DataLayer.id()))
    }
}

/// Prints queued envelopes to stdout, one JSON object per line.
pub fn print_events(tracker: &Tracker) {
    for entry in tracker.data_layer().drain() {
        println!("{}", entry);
    }
}

pub fn parse_json(what: &str, raw: &str) -> CliResult<serde_json::Value> {
    serde_json::from_str(raw).map_err(|source| CliError::InvalidJson {
        what: what.to_string(),
        source,
    })
}
