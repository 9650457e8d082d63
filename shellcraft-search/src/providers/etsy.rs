//! Etsy marketplace search scraper.
//!
//! Listing cards are tagged with `data-test-id` attributes. Image sources
//! may be relative or lazy-loaded (`data-src`), and the search grid serves
//! small thumbnails whose size is encoded in the file name, so known
//! thumbnail sizes are rewritten to a larger variant.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::provider::SearchProvider;
use crate::types::{Candidate, ProviderTier};

/// Public Etsy host.
pub const DEFAULT_BASE_URL: &str = "https://www.etsy.com";

/// Thumbnail size segment → larger size segment.
const THUMBNAIL_UPGRADES: &[(&str, &str)] = &[
    ("il_300x300", "il_600x600"),
    ("il_340x270", "il_794xN"),
    ("il_170x135", "il_794xN"),
    ("il_75x75", "il_600x600"),
];

/// Etsy search results scraper.
#[derive(Debug, Clone)]
pub struct EtsyProvider {
    base_url: String,
}

impl Default for EtsyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EtsyProvider {
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
impl SearchProvider for EtsyProvider {
    fn name(&self) -> &str {
        "Etsy"
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
        tracing::trace!(query, "Etsy search");

        let client = http::build_client(config)?;
        let site_query = format!("{query} shell craft");
        let request = client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", site_query.as_str())]);
        let html = http::send_for_text(self.name(), request).await?;

        tracing::trace!(bytes = html.len(), "Etsy response received");
        parse_etsy_html(&html, &self.base_url, query, limit)
    }
}

/// Rewrite a known thumbnail size to its larger variant.
pub(crate) fn upgrade_thumbnail(url: &str) -> String {
    THUMBNAIL_UPGRADES
        .iter()
        .find(|(small, _)| url.contains(small))
        .map_or_else(|| url.to_owned(), |(small, large)| url.replacen(small, large, 1))
}

/// Parse an Etsy search results page into candidates.
///
/// Relative links and image sources are resolved against `base_url`.
/// Cards without both an image and a listing link are skipped.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if `base_url` is not absolute.
pub(crate) fn parse_etsy_html(
    html: &str,
    base_url: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<Candidate>, SearchError> {
    let base = Url::parse(base_url)
        .map_err(|e| SearchError::Parse(format!("invalid Etsy base URL: {e}")))?;
    let document = Html::parse_document(html);

    let card_sel = Selector::parse(r#"[data-test-id="listing-card"]"#)
        .map_err(|e| SearchError::Parse(format!("invalid card selector: {e:?}")))?;
    let img_sel = Selector::parse("img")
        .map_err(|e| SearchError::Parse(format!("invalid image selector: {e:?}")))?;
    let link_sel = Selector::parse(r#"a[data-test-id="listing-link"]"#)
        .map_err(|e| SearchError::Parse(format!("invalid link selector: {e:?}")))?;

    let mut results = Vec::new();
    for card in document.select(&card_sel) {
        let Some(img) = card.select(&img_sel).next() else {
            continue;
        };
        let src = img
            .value()
            .attr("src")
            .filter(|s| !s.trim().is_empty() && !s.starts_with("data:"))
            .or_else(|| img.value().attr("data-src"));
        let Some(image_url) = src.and_then(|s| base.join(s.trim()).ok()) else {
            continue;
        };

        let Some(source_url) = card
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| base.join(href.trim()).ok())
        else {
            continue;
        };

        let title = img.value().attr("alt").unwrap_or_default();
        results.push(
            Candidate::new(
                upgrade_thumbnail(image_url.as_str()),
                source_url.to_string(),
                query,
                "Etsy",
            )
            .with_title(title)
            .with_description(title),
        );
        if results.len() >= limit {
            break;
        }
    }

    tracing::debug!(count = results.len(), "Etsy results parsed");
    Ok(results)
}
