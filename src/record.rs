//! Durable record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shellcraft_search::{Candidate, Category, Platform, content_id};

/// A curated image stored locally.
///
/// A persisted record is only valid while its `local_asset` exists in the
/// asset store; invalid records are hidden from every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub category: Category,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source_url: String,
    pub image_url: String,
    pub platform: Platform,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub provider: String,
    /// File name inside the asset store. `None` only while ingestion is
    /// downloading the asset.
    #[serde(default)]
    pub local_asset: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Record {
    /// A fresh record for `candidate`, without an asset yet.
    pub fn from_candidate(candidate: &Candidate, category: &Category, now: DateTime<Utc>) -> Self {
        Self {
            id: record_id(candidate),
            category: category.clone(),
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            source_url: candidate.source_url.clone(),
            image_url: candidate.image_url.clone(),
            platform: candidate.platform,
            search_query: candidate.search_query.clone(),
            provider: candidate.provider.clone(),
            local_asset: None,
            saved_at: now,
            last_updated_at: now,
        }
    }
}

/// Stable id for a candidate.
///
/// An explicit candidate id wins; otherwise the id is derived from
/// `source_url`, or from `image_url` when there is no source.
pub fn record_id(candidate: &Candidate) -> String {
    if let Some(id) = candidate.id.as_deref().filter(|id| !id.trim().is_empty()) {
        return id.trim().to_owned();
    }
    let source = candidate.source_url.trim();
    if source.is_empty() {
        content_id(candidate.image_url.trim())
    } else {
        content_id(source)
    }
}
