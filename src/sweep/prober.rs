//! HEAD prober with bounded retries
//!
//! A probe is one metadata-only request against a URL. Transport failures
//! (connect, DNS, TLS, timeout) are retried a fixed number of times with a
//! fixed pause in between; the reported latency is that of the last attempt.

use crate::config::ProbeConfig;
use reqwest::Client;
use std::time::{Duration, Instant};

/// Retries after the first attempt (4 attempts in total)
pub const MAX_RETRIES: u32 = 3;

/// Pause between two attempts
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Result of probing one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The URL answered
    Reachable {
        /// Wall-clock time of the successful attempt
        latency_ms: u64,
        /// Attempts made, including the successful one
        attempts: u32,
        /// HTTP status of the response
        status: u16,
    },

    /// Every attempt failed
    Exhausted {
        attempts: u32,
        /// Description of the last failure
        last_error: String,
    },
}

#[cfg(test)]
impl ProbeOutcome {
    fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable { .. })
    }

    fn attempts(&self) -> u32 {
        match self {
            Self::Reachable { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Builds the HTTP client shared by every probe
///
/// The pool keeps up to 100 idle connections per host, since input lists
/// usually hammer a handful of CDN hosts.
pub fn build_http_client(config: &ProbeConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("probe-sweep/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_max_idle_per_host(100)
        .build()
}

/// Probes URLs with a fixed retry budget
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
    http_errors_are_failures: bool,
}

impl Prober {
    /// Creates a prober from the probe configuration
    pub fn new(config: &ProbeConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
            http_errors_are_failures: config.http_errors_are_failures,
        })
    }

    /// Probes `url`, retrying failed attempts up to the retry budget
    ///
    /// Never returns before either one attempt succeeds or
    /// `1 + MAX_RETRIES` attempts have failed.
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries + 1 {
            let start = Instant::now();
            let result = self.client.head(url).send().await;
            let latency_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if self.http_errors_are_failures
                        && (status.is_client_error() || status.is_server_error())
                    {
                        last_error = format!("HTTP {}", status.as_u16());
                    } else {
                        return ProbeOutcome::Reachable {
                            latency_ms,
                            attempts: attempt,
                            status: status.as_u16(),
                        };
                    }
                }
                Err(e) => last_error = describe_error(&e),
            }

            if attempt <= self.max_retries {
                tracing::debug!("Retry {}: {} ({})", attempt, url, last_error);
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        ProbeOutcome::Exhausted {
            attempts: self.max_retries + 1,
            last_error,
        }
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else if e.is_builder() {
        format!("invalid request: {}", e)
    } else {
        e.to_string()
    }
}
