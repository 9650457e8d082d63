//! # shellcraft-search
//!
//! Image discovery across unreliable, rate-limited and quota-bound sources.
//!
//! ## Design
//!
//! - One [`SearchProvider`] per upstream: a metered JSON API, two search
//!   engine image scrapers, a marketplace scraper and a page extractor
//! - [`Orchestrator`] walks them in cost/reliability order, falls back when
//!   the metered API runs out of quota, and merges results first-wins by
//!   normalised image URL
//! - Per-provider pacing, bounded retries for transient errors, a health
//!   gate that parks failing providers, and a TTL result cache, all owned
//!   by the orchestrator instance
//! - Upload searches are keyword approximations; an optional
//!   [`KeywordSuggester`] can supply the keywords
//!
//! ## Security
//!
//! - API keys never appear in errors or logs
//! - Search queries are logged only at trace level

pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod health;
pub mod http;
pub mod orchestrator;
pub mod pacing;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod types;

pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use orchestrator::{KeywordHints, KeywordSuggester, Orchestrator};
pub use provider::SearchProvider;
pub use types::{content_id, Candidate, Category, Platform, ProviderTier};
