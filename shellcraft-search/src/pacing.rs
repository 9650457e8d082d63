//! Per-provider request pacing.
//!
//! A [`Pacer`] guarantees a minimum spacing (plus random jitter) between
//! consecutive requests to one provider. Callers that arrive early wait;
//! concurrent callers are serialized.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::SearchConfig;
use crate::http;

/// Minimum-interval gate for one provider.
#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    jitter_ms: (u64, u64),
    last_request: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Create a pacer with an explicit spacing and jitter range.
    pub fn new(min_interval: Duration, jitter_ms: (u64, u64)) -> Self {
        Self {
            min_interval,
            jitter_ms,
            last_request: Mutex::new(None),
        }
    }

    /// Create a pacer from `min_interval_ms` and `request_delay_ms`.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_interval_ms),
            config.request_delay_ms,
        )
    }

    /// Wait until a request is allowed, then claim the slot.
    ///
    /// The first request never waits.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let jitter = http::jitter(self.jitter_ms);
            tokio::time::sleep_until(previous + self.min_interval + jitter).await;
        }
        *last = Some(Instant::now());
    }
}
