use serde::Deserialize;

/// Main configuration structure for Probe-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub probe: ProbeConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

/// Probing and rate governance configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Target request rate, in requests per minute
    #[serde(rename = "requests-per-minute")]
    pub requests_per_minute: u32,

    /// Number of launches the rate governor lets through back to back
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Upper bound on concurrently running probes
    #[serde(rename = "max-in-flight", default = "default_max_in_flight")]
    pub max_in_flight: u32,

    /// Capacity of each result channel feeding the aggregator
    #[serde(rename = "channel-capacity", default = "default_channel_capacity")]
    pub channel_capacity: u32,

    /// Timeout for a single HEAD attempt (seconds)
    #[serde(
        rename = "request-timeout-secs",
        default = "default_request_timeout_secs"
    )]
    pub request_timeout_secs: u64,

    /// Count 4xx/5xx responses as failed attempts
    #[serde(rename = "http-errors-are-failures", default)]
    pub http_errors_are_failures: bool,
}

impl ProbeConfig {
    /// Whole requests per second derived from the per-minute target
    ///
    /// Rates below 60/min round down to zero; validation rejects those.
    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_minute / 60
    }

    /// Number of scanned lines between two periodic checkpoints
    pub fn checkpoint_interval(&self) -> u64 {
        u64::from(self.requests_per_second()) * 3
    }
}

/// Input location configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Directory holding the URL list files
    pub directory: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the failed URL log
    #[serde(rename = "failed-log-path")]
    pub failed_log_path: String,

    /// Size in megabytes after which the failed URL log is rotated
    #[serde(rename = "failed-log-max-size-mb", default = "default_failed_log_max_size_mb")]
    pub failed_log_max_size_mb: u64,
}

fn default_burst() -> u32 {
    1
}

fn default_max_in_flight() -> u32 {
    100
}

fn default_channel_capacity() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_failed_log_max_size_mb() -> u64 {
    100
}
