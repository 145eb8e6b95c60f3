//! Core error types for primepath-core.
//!
//! Storage failures are caught and logged at the persistence boundary and
//! never propagate into the timer engine; the errors here cover the paths
//! that legitimately surface to callers (initialization and configuration).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for primepath-core.
#[derive(Error, Debug)]
pub enum TimerError {
    /// The persistence key is unusable (empty or whitespace).
    #[error("Invalid persistence key: {reason}")]
    InvalidKey { reason: String },

    /// Another engine instance already owns this persistence key.
    #[error("Persistence key '{key}' is already owned by another timer")]
    KeyAlreadyOwned { key: String },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Snapshot-store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Snapshot-store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open snapshot store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Read failed
    #[error("Snapshot read failed: {0}")]
    ReadFailed(String),

    /// Write failed
    #[error("Snapshot write failed: {0}")]
    WriteFailed(String),

    /// Delete failed
    #[error("Snapshot delete failed: {0}")]
    DeleteFailed(String),

    /// Snapshot serialization failed
    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias for TimerError
pub type Result<T, E = TimerError> = std::result::Result<T, E>;
