//! Last-resort provider: fetch pages directly and pull images out of them.
//!
//! Each target page is downloaded, reduced to readable text for a short
//! description, and scanned for `<img>` tags pointing at real image files.
//! A page yields at most [`IMAGES_PER_PAGE`] candidates, each with its own
//! id so they do not collapse onto the shared page URL.

use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::content;
use crate::error::SearchError;
use crate::http;
use crate::provider::SearchProvider;
use crate::types::{content_id, Candidate, ProviderTier};

/// Maximum candidates synthesized from one page.
pub const IMAGES_PER_PAGE: usize = 3;

/// Seed page used when none are configured. `{query}` is replaced with the
/// URL-encoded query.
pub const DEFAULT_SEED_URLS: &[&str] = &["https://www.pinterest.com/search/pins/?q={query}"];

const DEFAULT_PAGE_TITLE: &str = "Shell Craft Project";
const DEFAULT_DESCRIPTION: &str = "Beautiful shell craft project";

/// Page-fetching content extraction provider.
#[derive(Debug, Clone)]
pub struct PageExtractionProvider {
    seed_urls: Vec<String>,
}

impl Default for PageExtractionProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SEED_URLS.iter().map(|s| (*s).to_owned()).collect())
    }
}

impl PageExtractionProvider {
    /// Build with explicit seed URL templates.
    pub fn new(seed_urls: Vec<String>) -> Self {
        Self { seed_urls }
    }

    /// Pages to fetch for `query`. An absolute http(s) query is fetched
    /// as-is; anything else is substituted into each seed template.
    pub fn targets(&self, query: &str) -> Vec<String> {
        let trimmed = query.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return vec![trimmed.to_owned()];
        }
        let encoded: String = url::form_urlencoded::byte_serialize(trimmed.as_bytes()).collect();
        self.seed_urls
            .iter()
            .map(|template| template.replace("{query}", &encoded))
            .collect()
    }
}

#[async_trait]
impl SearchProvider for PageExtractionProvider {
    fn name(&self) -> &str {
        "PageExtraction"
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Extraction
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        config: &SearchConfig,
    ) -> Result<Vec<Candidate>, SearchError> {
        tracing::trace!(query, "page extraction search");

        let client = http::build_client(config)?;
        let targets = self.targets(query);
        let mut results = Vec::new();
        let mut last_error = None;

        for (n, page_url) in targets.iter().enumerate() {
            if results.len() >= limit {
                break;
            }
            if n > 0 {
                tokio::time::sleep(http::jitter(config.request_delay_ms)).await;
            }
            match http::send_for_text(self.name(), client.get(page_url)).await {
                Ok(html) => {
                    let extracted = candidates_from_page(&html, page_url, query)?;
                    results.extend(extracted);
                }
                Err(err) => {
                    tracing::warn!(page = %page_url, error = %err, "page fetch failed");
                    last_error = Some(err);
                }
            }
        }

        if results.is_empty() {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        results.truncate(limit);
        Ok(results)
    }
}

/// Turn one fetched page into up to [`IMAGES_PER_PAGE`] candidates.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if `page_url` is not absolute.
pub(crate) fn candidates_from_page(
    html: &str,
    page_url: &str,
    query: &str,
) -> Result<Vec<Candidate>, SearchError> {
    let images = content::extract_image_urls(html, page_url, IMAGES_PER_PAGE)?;
    if images.is_empty() {
        return Ok(Vec::new());
    }

    let (title, description) = match content::extract_content(html, page_url) {
        Ok(page) => {
            let title = if page.title.is_empty() {
                DEFAULT_PAGE_TITLE.to_owned()
            } else {
                page.title
            };
            let description = content::summarize(&page.text, 3, 200)
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_owned());
            (title, description)
        }
        Err(_) => (DEFAULT_PAGE_TITLE.to_owned(), DEFAULT_DESCRIPTION.to_owned()),
    };

    let candidates = images
        .into_iter()
        .enumerate()
        .map(|(i, image_url)| {
            Candidate::new(image_url, page_url, query, "PageExtraction")
                .with_id(content_id(&format!("{page_url}_{i}")))
                .with_title(format!("{title} - Style {}", i + 1))
                .with_description(description.clone())
        })
        .collect::<Vec<_>>();

    tracing::debug!(count = candidates.len(), page = %page_url, "page images extracted");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><head><title>Shell Crafts Gallery</title></head>
<body><article>
<p>Shell frames are easy. Start with a plain frame. Add shells in rows. Seal with varnish.</p>
<img src="/img/one.jpg"><img src="/img/two.png"><img src="/img/three.webp"><img src="/img/four.jpg">
</article></body></html>"#;

    #[test]
    fn targets_substitute_encoded_query() {
        let provider = PageExtractionProvider::new(vec![
            "https://a.example.com/s?q={query}".into(),
            "https://b.example.com/{query}".into(),
        ]);
        assert_eq!(
            provider.targets("shell frame"),
            vec![
                "https://a.example.com/s?q=shell+frame".to_owned(),
                "https://b.example.com/shell+frame".to_owned(),
            ]
        );
        assert_eq!(
            provider.targets("https://crafts.example.com/page"),
            vec!["https://crafts.example.com/page".to_owned()]
        );
    }

    #[test]
    fn synthesizes_three_candidates_per_page() {
        let page_url = "https://crafts.example.com/gallery";
        let results = candidates_from_page(PAGE, page_url, "shell frame").expect("extract");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Shell Crafts Gallery - Style 1");
        assert_eq!(results[2].title, "Shell Crafts Gallery - Style 3");
        assert_eq!(results[0].image_url, "https://crafts.example.com/img/one.jpg");
        assert_eq!(
            results[0].description.as_deref(),
            Some("Shell frames are easy. Start with a plain frame. Add shells in rows.")
        );
        assert_eq!(
            results[1].id.as_deref(),
            Some(content_id("https://crafts.example.com/gallery_1").as_str())
        );
        assert_ne!(results[0].id, results[1].id);
    }

    #[test]
    fn defaults_when_page_has_no_text() {
        let html = r#"<html><body><img src="https://x.example.com/a.jpg"></body></html>"#;
        let results = candidates_from_page(html, "https://x.example.com/", "q").expect("extract");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Shell Craft Project - Style 1");
        assert_eq!(
            results[0].description.as_deref(),
            Some("Beautiful shell craft project")
        );
    }

    #[test]
    fn page_without_images_yields_nothing() {
        let html = "<html><body><p>Only words.</p></body></html>";
        let results = candidates_from_page(html, "https://x.example.com/", "q").expect("extract");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn fetches_seed_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gallery"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let provider = PageExtractionProvider::new(vec![format!("{}/gallery?q={{query}}", server.uri())]);
        let config = SearchConfig {
            timeout_seconds: 5,
            request_delay_ms: (0, 0),
            ..Default::default()
        };
        let results = provider
            .search("shell frame", 2, &config)
            .await
            .expect("search should succeed");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].provider, "PageExtraction");
    }

    #[tokio::test]
    async fn all_pages_failing_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = PageExtractionProvider::new(vec![format!("{}/a?q={{query}}", server.uri())]);
        let config = SearchConfig {
            timeout_seconds: 5,
            request_delay_ms: (0, 0),
            ..Default::default()
        };
        assert!(provider.search("q", 3, &config).await.is_err());
    }
}
