//! Auxiliary signal producers layered on the dispatcher.
//!
//! Each producer turns host callbacks into a bounded set of event envelopes
//! and keeps only its own bookkeeping. None of them touch identity or visit
//! fields; the tracker dispatches whatever they return.

mod adblock;
mod errors;
mod navigation;
mod scroll;
mod vitals;

pub use adblock::{AdBlockProbe, FixedProbe};
pub use errors::{ErrorKind, ErrorReport, ErrorTracker, MAX_TRACKED_ERRORS};
pub use navigation::NavigationDetector;
pub use scroll::ScrollDepthTracker;
pub use vitals::VitalsCollector;
