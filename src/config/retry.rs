// ABOUTME: Datastore contention retry policy.
// ABOUTME: Fixed backoff for reads (optionally bounded), bounded exponential backoff for writes.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_read_backoff", with = "humantime_serde")]
    pub read_backoff: Duration,

    /// `None` retries reads for as long as the datastore reports contention.
    #[serde(default)]
    pub read_max_attempts: Option<u32>,

    #[serde(default = "default_write_backoff", with = "humantime_serde")]
    pub write_backoff: Duration,

    #[serde(default = "default_write_max_attempts")]
    pub write_max_attempts: u32,
}

fn default_read_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_write_backoff() -> Duration {
    Duration::from_millis(100)
}

fn default_write_max_attempts() -> u32 {
    5
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            read_backoff: default_read_backoff(),
            read_max_attempts: None,
            write_backoff: default_write_backoff(),
            write_max_attempts: default_write_max_attempts(),
        }
    }
}
