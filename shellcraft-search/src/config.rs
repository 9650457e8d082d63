//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls timeouts, pacing, retries, provider health,
//! caching and the merge strategy. The defaults are tuned for polite
//! scraping; tests zero the delays.

use crate::error::SearchError;
use serde::{Deserialize, Serialize};

/// Configuration shared by the orchestrator and every provider.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour. Deserializes from a partial
/// TOML table; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default result limit when the caller does not pass one.
    pub max_results: usize,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Whether to request safe search filtering where supported.
    pub safe_search: bool,
    /// How long to cache merged results in seconds. 0 disables caching.
    pub cache_ttl_seconds: u64,
    /// Random jitter range in milliseconds `(min, max)` added between
    /// consecutive requests.
    pub request_delay_ms: (u64, u64),
    /// Minimum spacing in milliseconds between two requests to the same
    /// provider.
    pub min_interval_ms: u64,
    /// Custom User-Agent string. If `None`, rotates through a built-in list
    /// of realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// Query providers through a bounded pool instead of one at a time.
    pub parallel: bool,
    /// Pool size when `parallel` is set.
    pub max_concurrency: usize,
    /// Overall deadline for one orchestrated search, in seconds.
    pub deadline_seconds: Option<u64>,
    /// Retries for transient errors on the metered provider.
    pub max_retries: u32,
    /// Fixed delay between those retries, in milliseconds.
    pub retry_delay_ms: u64,
    /// Consecutive failures before a provider is skipped for a while.
    pub failure_threshold: u32,
    /// How long a failing provider is skipped, in seconds.
    pub failure_cooldown_secs: u64,
    /// How long a quota-exhausted provider is skipped, in seconds.
    pub quota_cooldown_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            timeout_seconds: 10,
            safe_search: true,
            cache_ttl_seconds: 600,
            request_delay_ms: (100, 500),
            min_interval_ms: 2_000,
            user_agent: None,
            parallel: false,
            max_concurrency: 4,
            deadline_seconds: None,
            max_retries: 2,
            retry_delay_ms: 500,
            failure_threshold: 3,
            failure_cooldown_secs: 60,
            quota_cooldown_secs: 3_600,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `max_results` must be greater than 0
    /// - `timeout_seconds` must be greater than 0
    /// - `request_delay_ms.0` must be <= `request_delay_ms.1`
    /// - `max_concurrency` must be greater than 0
    /// - `failure_threshold` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_results == 0 {
            return Err(SearchError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.request_delay_ms.0 > self.request_delay_ms.1 {
            return Err(SearchError::Config(
                "request_delay_ms min must be <= max".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(SearchError::Config(
                "max_concurrency must be greater than 0".into(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(SearchError::Config(
                "failure_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = SearchConfig::default();
        assert_eq!(config.max_results, 20);
        assert_eq!(config.timeout_seconds, 10);
        assert!(config.safe_search);
        assert_eq!(config.cache_ttl_seconds, 600);
        assert_eq!(config.request_delay_ms, (100, 500));
        assert_eq!(config.max_retries, 2);
        assert!(!config.parallel);
        assert!(config.user_agent.is_none());
        assert!(config.deadline_seconds.is_none());
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_max_results_rejected() {
        let config = SearchConfig {
            max_results: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_results"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = SearchConfig {
            timeout_seconds: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn invalid_delay_range_rejected() {
        let config = SearchConfig {
            request_delay_ms: (500, 100),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("delay"));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = SearchConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"parallel": true, "request_delay_ms": [0, 0]}"#)
                .expect("deserialize");
        assert!(config.parallel);
        assert_eq!(config.request_delay_ms, (0, 0));
        assert_eq!(config.max_concurrency, 4);
    }
}
