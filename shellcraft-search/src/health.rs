//! Per-provider health gate.
//!
//! Tracks consecutive failures per provider and temporarily skips providers
//! that fail repeatedly. A provider that reports quota exhaustion is parked
//! for a separate, longer cooldown so later searches go straight to the
//! fallbacks instead of burning a request on a known-dead quota.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure             │
//!     └─────────────────────────┴──────────────────────┘
//!
//!  any state ── quota exhausted ──► Exhausted ── quota cooldown ──► HalfOpen
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::SearchConfig;

/// Gate state for a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Healthy; requests go through.
    Closed,
    /// Too many consecutive failures; skipped until the cooldown expires.
    Open,
    /// Cooldown elapsed; the next request is a probe.
    HalfOpen,
    /// Quota exhausted; skipped until the quota cooldown expires.
    Exhausted,
}

/// Health tracking data for one provider.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub state: HealthState,
    pub consecutive_failures: u32,
    pub tripped_at: Option<Instant>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            state: HealthState::Closed,
            consecutive_failures: 0,
            tripped_at: None,
        }
    }
}

/// Thresholds for the health gate.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Consecutive failures before a provider is skipped.
    pub failure_threshold: u32,
    /// How long a failing provider stays Open.
    pub failure_cooldown: Duration,
    /// How long a quota-exhausted provider is parked.
    pub quota_cooldown: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for HealthConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            failure_cooldown: Duration::from_secs(config.failure_cooldown_secs),
            quota_cooldown: Duration::from_secs(config.quota_cooldown_secs),
        }
    }
}

/// Health gate keyed by provider name.
#[derive(Debug)]
pub struct HealthGate {
    config: HealthConfig,
    providers: HashMap<String, ProviderHealth>,
}

impl HealthGate {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            providers: HashMap::new(),
        }
    }

    /// Record a successful request; closes the gate.
    pub fn record_success(&mut self, provider: &str) {
        let health = self.providers.entry(provider.to_owned()).or_default();
        health.state = HealthState::Closed;
        health.consecutive_failures = 0;
        health.tripped_at = None;
    }

    /// Record a soft failure. Opens the gate at the threshold.
    pub fn record_failure(&mut self, provider: &str) {
        let health = self.providers.entry(provider.to_owned()).or_default();
        health.consecutive_failures += 1;
        if health.consecutive_failures >= self.config.failure_threshold
            || health.state == HealthState::HalfOpen
        {
            health.state = HealthState::Open;
            health.tripped_at = Some(Instant::now());
        }
    }

    /// Park a provider whose quota is exhausted.
    pub fn record_quota_exhausted(&mut self, provider: &str) {
        let health = self.providers.entry(provider.to_owned()).or_default();
        health.state = HealthState::Exhausted;
        health.tripped_at = Some(Instant::now());
    }

    /// Whether a request to `provider` should be attempted now.
    ///
    /// Open and Exhausted providers move to HalfOpen once their cooldown
    /// has elapsed.
    pub fn should_attempt(&mut self, provider: &str) -> bool {
        let health = self.providers.entry(provider.to_owned()).or_default();
        let cooldown = match health.state {
            HealthState::Closed | HealthState::HalfOpen => return true,
            HealthState::Open => self.config.failure_cooldown,
            HealthState::Exhausted => self.config.quota_cooldown,
        };
        let elapsed = health.tripped_at.is_none_or(|t| t.elapsed() >= cooldown);
        if elapsed {
            health.state = HealthState::HalfOpen;
        }
        elapsed
    }

    /// Current state for `provider`; unknown providers are Closed.
    pub fn status(&self, provider: &str) -> HealthState {
        self.providers
            .get(provider)
            .map_or(HealthState::Closed, |h| h.state)
    }

    /// `(provider, state, consecutive_failures)` for every tracked provider.
    pub fn report(&self) -> Vec<(String, HealthState, u32)> {
        let mut report: Vec<_> = self
            .providers
            .iter()
            .map(|(name, h)| (name.clone(), h.state, h.consecutive_failures))
            .collect();
        report.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }

    /// Forget all tracked state.
    pub fn reset(&mut self) {
        self.providers.clear();
    }
}
