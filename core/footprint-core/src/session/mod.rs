//! Visitor identity and visit lifecycle.
//!
//! Each activation feeds the previously stored record (if any) and the freshly
//! built attribution through [`next_record`], which decides one of three
//! outcomes:
//!
//! ```text
//! no record / user expired  → new user + new visit (count = 1)
//! visit expired / missing   → new visit (count + 1), same user
//! both fresh                → renew visit window, maybe swap in a new source
//! ```
//!
//! The caller persists the returned record and turns the flags into events.
//!
//! # Module Structure
//!
//! - [`transition`]: the pure transition function and its flags
//! - [`engagement`]: the deferred "engaged visit" promotion

pub mod engagement;
mod transition;

pub use engagement::{promote_engaged, EngagementOutcome};
pub use transition::{next_record, Transition, TransitionFlags, TransitionInput};
