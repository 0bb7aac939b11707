// ABOUTME: Retry-on-contention wrappers around datastore calls.
// ABOUTME: Reads back off at a fixed interval; writes are bounded with exponential backoff.

use std::future::Future;
use std::time::Duration;

use super::DbError;
use crate::config::RetryConfig;

/// Re-issue a read while the datastore reports contention.
///
/// Sleeps `read_backoff` between attempts. Unbounded unless
/// `read_max_attempts` is set; any other error is returned as-is.
pub async fn retry_read<T, F, Fut>(policy: &RetryConfig, what: &str, mut f: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match f().await {
            Err(e) if e.is_transient() => {
                if policy.read_max_attempts.is_some_and(|max| attempt >= max) {
                    tracing::warn!(what, attempt, "datastore still locked, giving up");
                    return Err(e);
                }
                tracing::debug!(what, attempt, "datastore locked, retrying");
                tokio::time::sleep(policy.read_backoff).await;
            }
            result => return result,
        }
    }
}

/// Re-issue a write while the datastore reports contention, at most
/// `write_max_attempts` times, doubling the backoff after each attempt.
pub async fn retry_write<T, F, Fut>(
    policy: &RetryConfig,
    what: &str,
    mut f: F,
) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let max = policy.write_max_attempts.max(1);
    let mut backoff = policy.write_backoff;
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match f().await {
            Err(e) if e.is_transient() => {
                if attempt >= max {
                    tracing::warn!(what, attempt, "datastore still locked, giving up");
                    return Err(e);
                }
                tracing::debug!(what, attempt, backoff = ?backoff, "datastore locked, retrying");
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2).min(Duration::from_secs(30));
            }
            result => return result,
        }
    }
}
