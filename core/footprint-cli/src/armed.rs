//! Engagement checks armed by `activate`, kept on disk for a later `tick`.
//!
//! A browser tab holds its timer in memory; the CLI process exits right after
//! activating, so the visit id and due time are written to `armed.json` under
//! the data root instead.

use std::path::Path;

use footprint_core::{TaskKind, Tracker};
use serde::{Deserialize, Serialize};

use crate::context::CliResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmedCheck {
    pub visit_id: String,
    pub due_at: i64,
}

/// Missing or unreadable files mean nothing is armed.
pub fn load(path: &Path) -> Vec<ArmedCheck> {
    let raw = match fs_err::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Armed checks unreadable, ignoring");
            return Vec::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Armed checks corrupt, ignoring");
        Vec::new()
    })
}

pub fn save(path: &Path, checks: &[ArmedCheck]) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(checks).map_err(std::io::Error::other)?;
    fs_err::write(path, json)?;
    Ok(())
}

/// Engagement checks still pending on the tracker's scheduler.
pub fn pending_in(tracker: &Tracker) -> Vec<ArmedCheck> {
    tracker
        .scheduler()
        .pending()
        .iter()
        .filter_map(|task| match &task.kind {
            TaskKind::EngagementCheck { visit_id } => Some(ArmedCheck {
                visit_id: visit_id.clone(),
                due_at: task.due_at,
            }),
            TaskKind::VitalsSummary => None,
        })
        .collect()
}

/// Adds `fresh` to what is already armed; a re-armed visit keeps one entry.
pub fn merge(existing: Vec<ArmedCheck>, fresh: Vec<ArmedCheck>) -> Vec<ArmedCheck> {
    let mut merged: Vec<ArmedCheck> = existing
        .into_iter()
        .filter(|old| !fresh.iter().any(|new| new.visit_id == old.visit_id))
        .collect();
    merged.extend(fresh);
    merged
}
