//! Image URL normalisation for deduplication.
//!
//! Canonicalises image URLs so that the same file reached through
//! cosmetically different links (parameter order, tracking parameters,
//! fragments, host capitalisation, default ports) compares as equal.
//! Size parameters such as `w=600` are kept: they select a different file.

use url::Url;

/// Tracking query parameters that are stripped during normalisation.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "ref_",
    "si",
];

/// Normalise a URL into a dedup key.
///
/// 1. Lowercase scheme and host (path is preserved as-is).
/// 2. Remove default ports.
/// 3. Remove the fragment.
/// 4. Strip tracking parameters and sort the rest by key.
/// 5. Remove a trailing slash from the path (unless the path is `/`).
///
/// Input that does not parse as a URL is only trimmed.
///
/// # Examples
///
/// ```
/// use shellcraft_search::orchestrator::url_normalize::normalize_url;
///
/// let a = normalize_url("https://IMG.Example.com/a.jpg?w=600&utm_source=x#top");
/// let b = normalize_url("https://img.example.com/a.jpg?w=600");
/// assert_eq!(a, b);
/// ```
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_owned();
    };

    parsed.set_fragment(None);

    if matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443))
    ) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(&params);
    }

    let path = parsed.path().to_owned();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }

    parsed.to_string()
}
