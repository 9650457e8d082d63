//! Search orchestrator: priority fan-out, quota fallback, dedup.
//!
//! This module walks providers in tier order, hands the share of a failing
//! or exhausted provider to the next one, merges results first-wins by
//! normalised image URL, and stops once the limit is reached.

pub mod dedup;
pub mod keywords;
pub mod queries;
pub mod search;
pub mod url_normalize;

pub use keywords::{KeywordHints, KeywordSuggester};
pub use search::Orchestrator;
