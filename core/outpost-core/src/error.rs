//! Error types for outpost operations.
//!
//! Only configuration errors are fatal to a run. Everything else is logged by
//! the driver loops and the cycle moves on.

use std::path::PathBuf;

/// All errors that can occur in outpost-core operations.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Config not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Configuration invalid: {path}: {details}")]
    ConfigInvalid { path: PathBuf, details: String },

    #[error("Could not determine application directory: {0}")]
    AppDirUnavailable(String),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Archive error: {context}: {source}")]
    Archive {
        context: String,
        #[source]
        source: zip::result::ZipError,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Delivery Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid mail address {address}: {details}")]
    InvalidAddress { address: String, details: String },

    #[error("Mail delivery failed: {0}")]
    Delivery(String),

    // ─────────────────────────────────────────────────────────────────────
    // Lock Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Another instance holds the lock at {path} (pid {pid})")]
    AlreadyRunning { path: PathBuf, pid: u32 },
}

impl MonitorError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        MonitorError::Io {
            context: context.into(),
            source,
        }
    }

    /// Configuration errors abort the process with a non-zero exit code.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            MonitorError::ConfigNotFound(_)
                | MonitorError::ConfigMalformed { .. }
                | MonitorError::ConfigInvalid { .. }
                | MonitorError::AppDirUnavailable(_)
        )
    }
}

/// Convenience type alias for Results using MonitorError.
pub type Result<T> = std::result::Result<T, MonitorError>;
