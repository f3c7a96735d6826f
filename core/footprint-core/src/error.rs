//! Error types for footprint-core operations.
//!
//! Most runtime failures (storage, connectors) are logged and swallowed by the
//! [`Tracker`](crate::Tracker) facade; these variants carry them up to that point.

use std::path::PathBuf;

/// All errors that can occur in footprint-core operations.
#[derive(Debug, thiserror::Error)]
pub enum FootprintError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration malformed: {details}")]
    ConfigMalformed { details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("I/O error: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Record Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Field is reserved on {kind} records: {field}")]
    ReservedField { kind: String, field: String },

    // ─────────────────────────────────────────────────────────────────────
    // Connector Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Connector {connector} failed: {details}")]
    ConnectorFailed { connector: String, details: String },
}

/// Convenience type alias for Results using FootprintError.
pub type Result<T> = std::result::Result<T, FootprintError>;
