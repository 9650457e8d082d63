//! Core orchestrator: priority-ordered fan-out with quota fallback,
//! first-wins dedup and early stop.
//!
//! Providers are walked in tier order (metered API, then scrapers, then
//! page extraction). Each is asked for an even share of the limit plus any
//! shortfall carried from the providers before it, so a provider that
//! escalates, fails or comes up short hands its share down the chain.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;

use crate::cache::{CacheKey, SearchCache};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::health::{HealthConfig, HealthGate, HealthState};
use crate::pacing::Pacer;
use crate::provider::SearchProvider;
use crate::types::{Candidate, Category};

use super::dedup::Deduplicator;
use super::keywords::KeywordSuggester;
use super::queries::{fallback_queries, hint_queries, per_query_limit, RELATED_QUERIES};

/// A provider plus its pacing state.
struct ProviderSlot {
    provider: Arc<dyn SearchProvider>,
    pacer: Pacer,
}

/// What happened when one provider was asked.
enum CallOutcome {
    Done(Result<Vec<Candidate>, SearchError>),
    Skipped,
    DeadlineExpired,
}

/// Multi-provider image search orchestrator.
///
/// Owns its providers, pacers, health gate and result cache; nothing is
/// process-global, so two orchestrators never share state.
pub struct Orchestrator {
    providers: Vec<ProviderSlot>,
    config: SearchConfig,
    health: Mutex<HealthGate>,
    cache: SearchCache,
    suggester: Option<Arc<dyn KeywordSuggester>>,
}

impl Orchestrator {
    /// Build an orchestrator over `providers`.
    ///
    /// Providers are stably sorted by tier, so the caller's order decides
    /// priority within a tier.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid config or an empty
    /// provider list.
    pub fn new(
        mut providers: Vec<Arc<dyn SearchProvider>>,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        if providers.is_empty() {
            return Err(SearchError::Config(
                "at least one provider must be configured".into(),
            ));
        }
        providers.sort_by_key(|p| p.tier());

        let providers = providers
            .into_iter()
            .map(|provider| ProviderSlot {
                provider,
                pacer: Pacer::from_config(&config),
            })
            .collect();

        Ok(Self {
            providers,
            health: Mutex::new(HealthGate::new(HealthConfig::from(&config))),
            cache: SearchCache::new(config.cache_ttl_seconds),
            config,
            suggester: None,
        })
    }

    /// Attach an image-to-keywords service for [`Self::search_similar`].
    pub fn with_suggester(mut self, suggester: Arc<dyn KeywordSuggester>) -> Self {
        self.suggester = Some(suggester);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Provider names in priority order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|s| s.provider.name()).collect()
    }

    /// `(provider, state, consecutive_failures)` for every provider seen.
    pub fn health_report(&self) -> Vec<(String, HealthState, u32)> {
        self.gate().report()
    }

    /// Search every provider for `query` and return at most `limit`
    /// unique candidates in provider-priority order.
    ///
    /// Provider failures are logged and absorbed. When
    /// `config.deadline_seconds` is set, the search stops at that deadline
    /// and returns what it has.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for a blank query.
    pub async fn search_all(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, SearchError> {
        self.run(query, limit, self.default_deadline()).await
    }

    /// [`Self::search_all`] with an explicit deadline. In-flight provider
    /// calls are abandoned when it passes.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for a blank query.
    pub async fn search_all_within(
        &self,
        query: &str,
        limit: usize,
        deadline: Instant,
    ) -> Result<Vec<Candidate>, SearchError> {
        self.run(query, limit, Some(deadline)).await
    }

    /// Search using the most specific pre-built query for `category`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::search_all`].
    pub async fn search_by_category(
        &self,
        category: &Category,
        limit: usize,
    ) -> Result<Vec<Candidate>, SearchError> {
        let Some(query) = category.queries().into_iter().next() else {
            return Ok(Vec::new());
        };
        tracing::debug!(%category, "category search");
        self.search_all(&query, limit).await
    }

    /// Approximate "find images like this one".
    ///
    /// This is a keyword search, not visual similarity. With a suggester
    /// attached, its hints about the image are blended with
    /// `user_keywords` into up to four queries; without one, or when it
    /// fails, a fixed set of related craft queries is used instead.
    ///
    /// # Errors
    ///
    /// Same as [`Self::search_all`].
    pub async fn search_similar(
        &self,
        image_path: &Path,
        user_keywords: &str,
        limit: usize,
    ) -> Result<Vec<Candidate>, SearchError> {
        let queries = match self.suggester {
            Some(ref suggester) => match suggester.suggest(image_path, user_keywords).await {
                Ok(hints) => {
                    let queries = hint_queries(&hints, user_keywords);
                    if queries.is_empty() {
                        fallback_queries(user_keywords)
                    } else {
                        queries
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "keyword suggester failed, using fallback queries");
                    fallback_queries(user_keywords)
                }
            },
            None => fallback_queries(user_keywords),
        };
        self.search_many(&queries, limit).await
    }

    /// Browse the fixed related-term queries.
    ///
    /// # Errors
    ///
    /// Same as [`Self::search_all`].
    pub async fn search_related(&self, limit: usize) -> Result<Vec<Candidate>, SearchError> {
        let queries: Vec<String> = RELATED_QUERIES.iter().map(|q| (*q).to_owned()).collect();
        self.search_many(&queries, limit).await
    }

    /// Run several queries with an even per-query share and merge them
    /// first-wins.
    async fn search_many(&self, queries: &[String], limit: usize) -> Result<Vec<Candidate>, SearchError> {
        if limit == 0 || queries.is_empty() {
            return Ok(Vec::new());
        }
        let deadline = self.default_deadline();
        let per_query = per_query_limit(limit, queries.len());
        let mut dedup = Deduplicator::new();

        for query in queries {
            if dedup.len() >= limit || deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            tracing::trace!(query = %query, "sub-query");
            let batch = self.run(query, per_query, deadline).await?;
            dedup.extend_until(batch, limit);
        }

        Ok(dedup.finish(limit))
    }

    fn default_deadline(&self) -> Option<Instant> {
        self.config
            .deadline_seconds
            .map(|secs| Instant::now() + Duration::from_secs(secs))
    }

    async fn run(
        &self,
        query: &str,
        limit: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<Candidate>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::Config("query must not be empty".into()));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let key = CacheKey::new(query, &self.provider_names(), limit);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(count = hit.len(), "search cache hit");
            return Ok(hit);
        }

        let share = per_query_limit(limit, self.providers.len());
        let results = if self.config.parallel {
            self.run_parallel(query, limit, share, deadline).await
        } else {
            self.run_sequential(query, limit, share, deadline).await
        };

        tracing::debug!(count = results.len(), limit, "search complete");
        if !results.is_empty() {
            self.cache.insert(key, results.clone()).await;
        }
        Ok(results)
    }

    async fn run_sequential(
        &self,
        query: &str,
        limit: usize,
        share: usize,
        deadline: Option<Instant>,
    ) -> Vec<Candidate> {
        let mut dedup = Deduplicator::new();
        let mut carry = 0;

        for slot in &self.providers {
            if dedup.len() >= limit {
                break;
            }
            let ask = share + carry;
            match self.call(slot, query, ask, deadline).await {
                CallOutcome::DeadlineExpired => {
                    tracing::warn!(provider = %slot.provider.name(), "search deadline reached");
                    break;
                }
                outcome => {
                    let added = self.absorb(slot, outcome, &mut dedup, limit);
                    carry = ask.saturating_sub(added);
                }
            }
        }

        dedup.finish(limit)
    }

    /// Query every provider through a bounded pool. Outcomes are merged in
    /// priority order regardless of completion order; shortfalls are not
    /// redistributed.
    async fn run_parallel(
        &self,
        query: &str,
        limit: usize,
        share: usize,
        deadline: Option<Instant>,
    ) -> Vec<Candidate> {
        let outcomes: Vec<CallOutcome> = futures::stream::iter(
            self.providers
                .iter()
                .map(|slot| self.call(slot, query, share, deadline)),
        )
        .buffered(self.config.max_concurrency)
        .collect()
        .await;

        let mut dedup = Deduplicator::new();
        for (slot, outcome) in self.providers.iter().zip(outcomes) {
            if let CallOutcome::DeadlineExpired = outcome {
                tracing::warn!(provider = %slot.provider.name(), "search deadline reached");
                continue;
            }
            self.absorb(slot, outcome, &mut dedup, limit);
        }
        dedup.finish(limit)
    }

    /// Ask one provider for `ask` candidates, honouring the health gate,
    /// the provider's pacing and the deadline.
    async fn call(
        &self,
        slot: &ProviderSlot,
        query: &str,
        ask: usize,
        deadline: Option<Instant>,
    ) -> CallOutcome {
        let name = slot.provider.name();
        if !self.gate().should_attempt(name) {
            tracing::debug!(provider = %name, "provider skipped by health gate");
            return CallOutcome::Skipped;
        }

        let request = async {
            slot.pacer.wait().await;
            slot.provider.search(query, ask, &self.config).await
        };
        match deadline {
            Some(at) => match tokio::time::timeout_at(at, request).await {
                Ok(result) => CallOutcome::Done(result),
                Err(_) => CallOutcome::DeadlineExpired,
            },
            None => CallOutcome::Done(request.await),
        }
    }

    /// Fold one provider outcome into the merge and the health gate.
    /// Returns how many new unique candidates it contributed.
    fn absorb(
        &self,
        slot: &ProviderSlot,
        outcome: CallOutcome,
        dedup: &mut Deduplicator,
        limit: usize,
    ) -> usize {
        let name = slot.provider.name();
        match outcome {
            CallOutcome::Done(Ok(batch)) => {
                self.gate().record_success(name);
                let returned = batch.len();
                let added = dedup.extend_until(batch, limit);
                tracing::debug!(provider = %name, returned, added, "provider returned results");
                added
            }
            CallOutcome::Done(Err(err)) if err.is_escalation() => {
                tracing::warn!(provider = %name, error = %err, "provider quota exhausted, falling back");
                self.gate().record_quota_exhausted(name);
                0
            }
            CallOutcome::Done(Err(err)) => {
                tracing::warn!(provider = %name, error = %err, "provider query failed");
                self.gate().record_failure(name);
                0
            }
            CallOutcome::Skipped | CallOutcome::DeadlineExpired => 0,
        }
    }

    fn gate(&self) -> std::sync::MutexGuard<'_, HealthGate> {
        self.health
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
