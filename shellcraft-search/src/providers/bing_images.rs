//! Bing image results scraper.
//!
//! Each result tile is an `a.iusc` anchor whose `m` attribute carries a
//! JSON blob with the title (`t`), media URL (`murl`), page URL (`purl`)
//! and an optional description. A tile whose blob fails to decode is
//! skipped; the rest of the page still counts.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::provider::SearchProvider;
use crate::types::{Candidate, ProviderTier};

/// Public Bing image search page.
pub const DEFAULT_BASE_URL: &str = "https://www.bing.com";

/// Bing image search scraper.
#[derive(Debug, Clone)]
pub struct BingImagesProvider {
    base_url: String,
}

impl Default for BingImagesProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BingImagesProvider {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    /// Point the provider at a different host (tests, mirrors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }
}

#[async_trait]
impl SearchProvider for BingImagesProvider {
    fn name(&self) -> &str {
        "Bing"
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Scraping
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        config: &SearchConfig,
    ) -> Result<Vec<Candidate>, SearchError> {
        tracing::trace!(query, "Bing image search");

        let client = http::build_client(config)?;
        let adult = if config.safe_search { "strict" } else { "off" };

        let request = client
            .get(format!("{}/images/search", self.base_url))
            .query(&[("q", query), ("form", "HDRSC2"), ("first", "1"), ("adlt", adult)]);
        let html = http::send_for_text(self.name(), request).await?;

        tracing::trace!(bytes = html.len(), "Bing response received");
        parse_bing_images_html(&html, query, limit)
    }
}

#[derive(Debug, Deserialize)]
struct TileMetadata {
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    murl: Option<String>,
    #[serde(default)]
    purl: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    d: Option<String>,
}

/// Parse a Bing image results page into candidates.
///
/// Extracted as a separate function for testability with mock HTML.
pub(crate) fn parse_bing_images_html(
    html: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<Candidate>, SearchError> {
    let document = Html::parse_document(html);
    let tile_sel = Selector::parse("a.iusc")
        .map_err(|e| SearchError::Parse(format!("invalid tile selector: {e:?}")))?;

    let mut results = Vec::new();
    for tile in document.select(&tile_sel) {
        let Some(raw) = tile.value().attr("m") else {
            continue;
        };
        let meta: TileMetadata = match serde_json::from_str(raw) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::trace!(error = %e, "skipping malformed Bing tile");
                continue;
            }
        };
        let (Some(image_url), Some(source_url)) = (meta.murl, meta.purl) else {
            continue;
        };

        let description = meta
            .desc
            .or(meta.d)
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Shell craft found via Bing Images search for '{query}'"));

        results.push(
            Candidate::new(image_url, source_url, query, "Bing")
                .with_title(meta.t.unwrap_or_default())
                .with_description(description),
        );
        if results.len() >= limit {
            break;
        }
    }

    tracing::debug!(count = results.len(), "Bing results parsed");
    Ok(results)
}
