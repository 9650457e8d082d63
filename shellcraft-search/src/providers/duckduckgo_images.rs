//! DuckDuckGo image search via the two-step token handshake.
//!
//! The landing page embeds a per-query `vqd` session token; the JSON
//! endpoint `i.js` refuses requests without it. The token's shape is
//! upstream-controlled, so several known patterns are tried in order and
//! a page with no recognisable token yields no results rather than an
//! error.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::provider::SearchProvider;
use crate::types::{Candidate, ProviderTier};

/// Public DuckDuckGo host.
pub const DEFAULT_BASE_URL: &str = "https://duckduckgo.com";

/// Known token shapes, most specific first.
const VQD_PATTERNS: &[&str] = &[
    r"vqd=([\d-]+)",
    r#""vqd":"([\d-]+)""#,
    r#"vqd":\s*"([\d-]+)""#,
    r"vqd=([^&,\s]+)",
];

/// DuckDuckGo image search provider.
#[derive(Debug, Clone)]
pub struct DuckDuckGoImagesProvider {
    base_url: String,
}

impl Default for DuckDuckGoImagesProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DuckDuckGoImagesProvider {
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
impl SearchProvider for DuckDuckGoImagesProvider {
    fn name(&self) -> &str {
        "DuckDuckGo"
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
        tracing::trace!(query, "DuckDuckGo image search");

        let client = http::build_client(config)?;

        let landing = client
            .get(format!("{}/", self.base_url))
            .query(&[("q", query), ("iax", "images"), ("ia", "images")]);
        let page = http::send_for_text(self.name(), landing).await?;

        let Some(vqd) = extract_vqd(&page) else {
            tracing::debug!("DuckDuckGo token not found, returning no results");
            return Ok(Vec::new());
        };

        tokio::time::sleep(http::jitter(config.request_delay_ms)).await;

        let safe = if config.safe_search { "1" } else { "-1" };
        let request = client
            .get(format!("{}/i.js", self.base_url))
            .query(&[
                ("l", "us-en"),
                ("o", "json"),
                ("q", query),
                ("vqd", vqd.as_str()),
                ("f", ",,,"),
                ("p", safe),
            ])
            .header("Accept", "application/json")
            .header("Referer", format!("{}/", self.base_url));
        let body = http::send_for_text(self.name(), request).await?;

        tracing::trace!(bytes = body.len(), "DuckDuckGo response received");
        parse_duckduckgo_json(&body, query, limit)
    }
}

/// Find the session token on a landing page, trying each known shape.
pub(crate) fn extract_vqd(page: &str) -> Option<String> {
    VQD_PATTERNS.iter().find_map(|pattern| {
        let re = Regex::new(pattern).ok()?;
        re.captures(page)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
            .filter(|token| !token.is_empty())
    })
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    results: Vec<ImageResult>,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Decode the `i.js` JSON payload into candidates.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if the body is not JSON of the expected
/// shape.
pub(crate) fn parse_duckduckgo_json(
    body: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<Candidate>, SearchError> {
    let response: ImageResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("DuckDuckGo JSON decode failed: {e}")))?;

    let results: Vec<Candidate> = response
        .results
        .into_iter()
        .filter_map(|r| {
            let image = r.image.filter(|s| !s.is_empty())?;
            let url = r.url.filter(|s| !s.is_empty())?;
            Some(
                Candidate::new(image, url, query, "DuckDuckGo")
                    .with_title(r.title.unwrap_or_default())
                    .with_description(format!(
                        "Shell craft found via DuckDuckGo search for '{query}'"
                    )),
            )
        })
        .take(limit)
        .collect();

    tracing::debug!(count = results.len(), "DuckDuckGo results parsed");
    Ok(results)
}
