//! Error types for the shellcraft-search crate.
//!
//! Provider failures are classified so the orchestrator can tell a
//! retryable hiccup from a quota escalation from a hard failure. No API
//! keys appear in error messages.

/// Errors that can occur while querying image search providers.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Timeout or dropped connection. Retryable a bounded number of times.
    #[error("transient network error: {0}")]
    Transient(String),

    /// The provider's quota or rate limit is exhausted. The orchestrator
    /// switches to the next provider instead of retrying.
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// An HTTP request failed with a non-retryable status or transport error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The upstream payload could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// A candidate is missing a required field.
    #[error("invalid candidate: {0}")]
    Validation(String),

    /// Invalid search or provider configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SearchError {
    /// Whether a bounded retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the provider asked to be skipped for the rest of the session.
    pub fn is_escalation(&self) -> bool {
        matches!(self, Self::QuotaExhausted(_))
    }
}

/// Convenience type alias for shellcraft-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
