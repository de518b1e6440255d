//! Probe-Sweep: a resumable bulk URL prober
//!
//! This crate checks the availability and latency of large URL lists spread
//! across many input files. Every successful probe is cached in a SQLite
//! database and every file carries a scan checkpoint, so an interrupted run
//! can be restarted without repeating completed work.

pub mod config;
pub mod output;
pub mod storage;
pub mod sweep;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Probe-Sweep operations
///
/// Every variant here is fatal to a run. Per-URL and per-key failures are
/// isolated further down (see [`sweep::DroppedWrite`] and
/// [`sweep::CheckpointFault`]).
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StoreError),

    #[error("Failed to list input directory {path}: {source}")]
    InputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read input file {path}: {source}")]
    InputFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open failure log {path}: {source}")]
    FailureLog {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Probe pool was closed while dispatching")]
    PoolClosed,

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Probe-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use sweep::{run_sweep, SweepReport};
