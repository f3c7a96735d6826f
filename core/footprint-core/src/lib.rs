//! # footprint-core
//!
//! Visitor identity and visit tracking for a single browser profile: a
//! long-lived user id, a short-lived visit id, first-touch attribution, and
//! lifecycle events fanned out to analytics connectors.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Deferred work is a task queue the host drives.
//! - **Never throws at the host**: Storage, cookie, and connector failures are logged and absorbed.
//! - **Capabilities in, events out**: Storage, cookies, clock, and page context are injected traits.
//! - **Storage is the source of truth**: Accessors and the engagement check re-read the persisted record.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use footprint_core::{Capabilities, StaticEnvironment, Tracker, TrackerConfig};
//!
//! let env = Arc::new(StaticEnvironment::new("https://shop.example/?utm_source=news"));
//! let mut tracker = Tracker::init(TrackerConfig::default(), Capabilities::in_memory(env))?;
//! let user_id = tracker.user_id();
//! tracker.run_due_tasks();
//! ```

// Public modules
pub mod attribution;
pub mod config;
pub mod connectors;
pub mod device;
pub mod environment;
pub mod error;
pub mod ids;
pub mod patterns;
pub mod scheduler;
pub mod session;
pub mod signals;
pub mod storage;
pub mod tracker;
pub mod types;

// Re-export commonly used items at crate root
pub use attribution::*;
pub use config::*;
pub use connectors::{
    BuiltInConnector, Connector, ConnectorSinks, ConnectorSpec, DataLayer, DispatchReport,
    Dispatcher, FnConnector, TagCallLog,
};
pub use device::DeviceType;
pub use environment::*;
pub use error::{FootprintError, Result};
pub use ids::*;
pub use scheduler::{ScheduledTask, Scheduler, TaskKind};
pub use session::{EngagementOutcome, Transition, TransitionFlags};
pub use signals::{AdBlockProbe, ErrorKind, ErrorReport, FixedProbe};
pub use storage::*;
pub use tracker::{Capabilities, Tracker};
pub use types::*;
