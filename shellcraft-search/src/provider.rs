//! Trait definition for pluggable image search providers.
//!
//! Each upstream (metered API, search engine scraper, marketplace scraper,
//! page extractor) implements [`SearchProvider`] so the orchestrator can
//! drive them uniformly and hold them as trait objects.

use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::{Candidate, ProviderTier};

/// A pluggable image search backend.
///
/// Implementors handle their own URL construction, request headers,
/// payload decoding and error classification. The contract:
///
/// - `Ok(vec![])` is a normal "no results" answer.
/// - Transport errors and undecodable payloads are `Err` values that the
///   orchestrator treats as a soft failure of this provider only.
/// - [`SearchError::QuotaExhausted`] asks the orchestrator to stop calling
///   this provider and hand its share to the next one.
///
/// All implementations must be `Send + Sync` so they can be shared across
/// tasks behind an `Arc`.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable provider name used in logs, health tracking and provenance.
    fn name(&self) -> &str;

    /// Cost/reliability tier; decides where the provider sits in the
    /// fallback order.
    fn tier(&self) -> ProviderTier;

    /// Search for up to `limit` image candidates.
    ///
    /// # Errors
    ///
    /// See the trait-level contract.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        config: &SearchConfig,
    ) -> Result<Vec<Candidate>, SearchError>;
}
