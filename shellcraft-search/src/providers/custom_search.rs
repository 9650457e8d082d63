//! Metered structured image search via the Google Custom Search JSON API.
//!
//! The cheapest and most precise provider, but quota-bound: HTTP 429 or a
//! quota marker in the error body is reported as
//! [`SearchError::QuotaExhausted`] so the orchestrator can fall back.
//! Transient failures are retried a bounded number of times.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::provider::SearchProvider;
use crate::retry::retry_transient;
use crate::types::{Candidate, ProviderTier};

/// Public Custom Search endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GOOGLE_CUSTOM_SEARCH_API_KEY";
/// Environment variable holding the search engine id (`cx`).
pub const ENGINE_ID_ENV: &str = "GOOGLE_CUSTOM_SEARCH_ENGINE_ID";

/// The API returns at most this many items per request.
const MAX_PER_REQUEST: usize = 10;

/// Error-body markers that mean the quota is gone rather than the request
/// being wrong.
const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "ratelimitexceeded",
    "dailylimitexceeded",
    "userratelimitexceeded",
];

/// Custom Search API provider.
#[derive(Debug, Clone)]
pub struct CustomSearchProvider {
    api_key: String,
    engine_id: String,
    endpoint: String,
}

impl CustomSearchProvider {
    pub fn new(api_key: impl Into<String>, engine_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
        }
    }

    /// Point the provider at a different endpoint (tests, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Build from the standard environment variables, if both are set.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty())?;
        let cx = std::env::var(ENGINE_ID_ENV).ok().filter(|v| !v.is_empty())?;
        Some(Self::new(key, cx))
    }

    async fn request_once(
        &self,
        client: &reqwest::Client,
        query: &str,
        limit: usize,
        config: &SearchConfig,
    ) -> Result<Vec<Candidate>, SearchError> {
        let num = limit.clamp(1, MAX_PER_REQUEST).to_string();
        let safe = if config.safe_search { "active" } else { "off" };

        let response = client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("searchType", "image"),
                ("num", num.as_str()),
                ("safe", safe),
                ("imgType", "photo"),
                ("imgSize", "medium"),
            ])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| http::classify_request_error("CustomSearch", &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| http::classify_request_error("CustomSearch", &e))?;

        if !status.is_success() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || is_quota_error(&body) {
                return Err(SearchError::QuotaExhausted(format!(
                    "CustomSearch quota exceeded (HTTP {status})"
                )));
            }
            return Err(http::classify_status("CustomSearch", status, &body));
        }

        tracing::trace!(bytes = body.len(), "CustomSearch response received");
        parse_custom_search_json(&body, query, limit)
    }
}

#[async_trait]
impl SearchProvider for CustomSearchProvider {
    fn name(&self) -> &str {
        "CustomSearch"
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Metered
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        config: &SearchConfig,
    ) -> Result<Vec<Candidate>, SearchError> {
        tracing::trace!(query, "CustomSearch search");

        if self.api_key.is_empty() || self.engine_id.is_empty() {
            return Err(SearchError::Config(
                "CustomSearch requires an API key and engine id".into(),
            ));
        }

        let client = http::build_client(config)?;
        retry_transient(
            self.name(),
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
            || self.request_once(&client, query, limit, config),
        )
        .await
    }
}

fn is_quota_error(body: &str) -> bool {
    let lower = body.to_lowercase();
    QUOTA_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    link: Option<String>,
    title: Option<String>,
    snippet: Option<String>,
    image: Option<CseImage>,
    #[serde(rename = "displayLink")]
    display_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CseImage {
    #[serde(rename = "contextLink")]
    context_link: Option<String>,
}

/// Decode a Custom Search JSON response into candidates.
///
/// Items without an image link are skipped. The source page is the
/// image's context link, falling back to the display domain and then to
/// the image itself.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if the body is not a Custom Search
/// response.
pub(crate) fn parse_custom_search_json(
    body: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<Candidate>, SearchError> {
    let response: CseResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("CustomSearch JSON decode failed: {e}")))?;

    let mut results = Vec::new();
    for item in response.items {
        let Some(link) = item.link.filter(|l| !l.is_empty()) else {
            continue;
        };
        let source = item
            .image
            .and_then(|img| img.context_link)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                item.display_link
                    .filter(|d| !d.is_empty())
                    .map(|d| format!("https://{d}"))
            })
            .unwrap_or_else(|| link.clone());

        let description = item.snippet.unwrap_or_else(|| {
            format!("Shell craft found via Google Images search for '{query}'")
        });

        results.push(
            Candidate::new(link, source, query, "CustomSearch")
                .with_title(item.title.unwrap_or_default())
                .with_description(description),
        );
        if results.len() >= limit {
            break;
        }
    }

    tracing::debug!(count = results.len(), "CustomSearch results parsed");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CSE_JSON: &str = r#"{
        "kind": "customsearch#search",
        "items": [
            {
                "title": "Seashell Frame",
                "link": "https://i.etsystatic.com/frame.jpg",
                "displayLink": "www.etsy.com",
                "snippet": "Handmade seashell frame",
                "image": {"contextLink": "https://www.etsy.com/listing/123", "width": 800}
            },
            {
                "title": "No link here",
                "displayLink": "example.com"
            },
            {
                "link": "https://img.example.com/box.png",
                "displayLink": "crafts.example.com"
            }
        ]
    }"#;

    fn test_config() -> SearchConfig {
        SearchConfig {
            timeout_seconds: 5,
            request_delay_ms: (0, 0),
            retry_delay_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn parses_items_and_skips_missing_links() {
        let results = parse_custom_search_json(CSE_JSON, "shell frame", 10).expect("parse");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Seashell Frame");
        assert_eq!(results[0].source_url, "https://www.etsy.com/listing/123");
        assert_eq!(results[0].platform, Platform::Etsy);
        assert_eq!(results[0].description.as_deref(), Some("Handmade seashell frame"));
        assert_eq!(results[1].source_url, "https://crafts.example.com");
        assert_eq!(results[1].title, crate::types::DEFAULT_TITLE);
        assert!(results[1]
            .description
            .as_deref()
            .is_some_and(|d| d.contains("'shell frame'")));
    }

    #[test]
    fn respects_limit() {
        let results = parse_custom_search_json(CSE_JSON, "q", 1).expect("parse");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn missing_items_is_empty_not_error() {
        let results = parse_custom_search_json(r#"{"kind": "x"}"#, "q", 5).expect("parse");
        assert!(results.is_empty());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = parse_custom_search_json("<html>", "q", 5).unwrap_err();
        assert!(matches!(err, SearchError::Parse(_)));
    }

    #[test]
    fn quota_markers_detected() {
        assert!(is_quota_error(
            r#"{"error":{"errors":[{"reason":"dailyLimitExceeded"}]}}"#
        ));
        assert!(is_quota_error("Quota exceeded for quota metric"));
        assert!(!is_quota_error(r#"{"error":{"message":"Invalid Value"}}"#));
    }

    #[tokio::test]
    async fn missing_credentials_is_config_error() {
        let provider = CustomSearchProvider::new("", "cx");
        let err = provider.search("q", 5, &test_config()).await.unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[tokio::test]
    async fn sends_image_search_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .and(query_param("searchType", "image"))
            .and(query_param("key", "k"))
            .and(query_param("cx", "c"))
            .and(query_param("num", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CSE_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CustomSearchProvider::new("k", "c")
            .with_endpoint(format!("{}/customsearch/v1", server.uri()));
        let results = provider
            .search("shell frame", 3, &test_config())
            .await
            .expect("search should succeed");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].provider, "CustomSearch");
    }

    #[tokio::test]
    async fn http_429_escalates_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CustomSearchProvider::new("k", "c").with_endpoint(server.uri());
        let err = provider.search("q", 5, &test_config()).await.unwrap_err();
        assert!(err.is_escalation());
    }

    #[tokio::test]
    async fn quota_body_escalates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                r#"{"error":{"code":403,"errors":[{"reason":"dailyLimitExceeded"}]}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CustomSearchProvider::new("k", "c").with_endpoint(server.uri());
        let err = provider.search("q", 5, &test_config()).await.unwrap_err();
        assert!(err.is_escalation());
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CustomSearchProvider::new("k", "c").with_endpoint(server.uri());
        let err = provider.search("q", 5, &test_config()).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(!err.is_escalation());
    }

    #[tokio::test]
    async fn gateway_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CustomSearchProvider::new("k", "c").with_endpoint(server.uri());
        let err = provider.search("q", 5, &test_config()).await.unwrap_err();
        assert!(matches!(err, SearchError::Http(_)));
    }

    #[tokio::test]
    async fn timeouts_retried_at_most_twice() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(CSE_JSON)
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let provider = CustomSearchProvider::new("k", "c").with_endpoint(server.uri());
        let config = SearchConfig {
            timeout_seconds: 1,
            ..test_config()
        };
        let err = provider.search("q", 5, &config).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_response_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CustomSearchProvider::new("k", "c").with_endpoint(server.uri());
        let err = provider.search("q", 5, &test_config()).await.unwrap_err();
        assert!(matches!(err, SearchError::Parse(_)));
    }
}
