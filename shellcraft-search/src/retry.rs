//! Bounded fixed-delay retry for transient provider errors.

use std::future::Future;
use std::time::Duration;

use crate::error::SearchError;

/// Run `op`, retrying up to `max_retries` times with a fixed `delay`
/// while it fails with a transient error.
///
/// Quota, HTTP status, parse and config errors are returned immediately.
pub async fn retry_transient<T, F, Fut>(
    provider: &str,
    max_retries: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_transient() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(provider, attempt, error = %err, "transient failure, retrying");
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}
