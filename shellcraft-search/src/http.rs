//! Shared HTTP client with User-Agent rotation and error classification.
//!
//! Provides a configured [`reqwest::Client`] with browser-like headers,
//! cookie support, and rotating User-Agent strings to avoid bot detection,
//! plus the mapping from transport failures onto [`SearchError`] classes.

use crate::config::SearchConfig;
use crate::error::SearchError;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::StatusCode;
use std::time::Duration;

/// Realistic browser User-Agent strings, rotated per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a [`reqwest::Client`] configured for image search requests.
///
/// The client has:
/// - Cookie store enabled (the DuckDuckGo handshake relies on it)
/// - Timeout from config
/// - Random User-Agent from built-in rotation list (or custom if configured)
/// - Browser-like `Accept` / `Accept-Language` defaults
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
    let ua = match config.user_agent {
        Some(ref custom) => custom.clone(),
        None => random_user_agent().to_owned(),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(ua)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // SAFETY: USER_AGENTS is a non-empty const array, choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}

/// Pick a random delay inside a `(min, max)` millisecond range.
pub fn jitter((min, max): (u64, u64)) -> Duration {
    if min >= max {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

/// Classify a transport-level failure from `provider`.
///
/// Timeouts and connection failures are transient; everything else is
/// a plain HTTP error.
pub fn classify_request_error(provider: &str, err: &reqwest::Error) -> SearchError {
    if err.is_timeout() || err.is_connect() {
        SearchError::Transient(format!("{provider} request failed: {err}"))
    } else if let Some(status) = err.status() {
        classify_status(provider, status, "")
    } else {
        SearchError::Http(format!("{provider} request failed: {err}"))
    }
}

/// Classify a non-success HTTP status from `provider`.
///
/// Every status is a plain, non-retryable HTTP error, including 429 and
/// the 5xx gateway codes. Only the metered provider turns a status into a
/// quota escalation, and it does so itself.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> SearchError {
    let detail = body.chars().take(200).collect::<String>();
    if detail.is_empty() {
        SearchError::Http(format!("{provider} HTTP {status}"))
    } else {
        SearchError::Http(format!("{provider} HTTP {status}: {detail}"))
    }
}

/// Send `request` and return the body text, mapping failures per provider.
pub(crate) async fn send_for_text(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<String, SearchError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_request_error(provider, &e))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(provider, status, &body));
    }
    response
        .text()
        .await
        .map_err(|e| classify_request_error(provider, &e))
}
