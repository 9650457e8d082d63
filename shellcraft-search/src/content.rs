//! HTML content extraction for the page-extraction provider.
//!
//! Strips boilerplate to get readable main text, pulls `<img>` sources that
//! point at recognised image formats, and condenses the text into a short
//! description.

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{Result, SearchError};

/// Default maximum characters kept from extracted text.
pub const DEFAULT_MAX_CHARS: usize = 100_000;

/// Image file extensions accepted from `<img src>` values.
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];

/// Extracted readable content from a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// The URL that was fetched.
    pub url: String,
    /// The page title, empty when the page has none.
    pub title: String,
    /// Cleaned, readable text with boilerplate stripped.
    pub text: String,
    /// Number of words in `text`.
    pub word_count: usize,
}

/// Extract readable text content from raw HTML.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if no extractable content is found.
pub fn extract_content(html: &str, url: &str) -> Result<PageContent> {
    let cleaned_html = strip_boilerplate_tags(html);
    let document = Html::parse_document(&cleaned_html);

    let title = extract_title(&document);
    let text = normalise_whitespace(&extract_main_text(&document));
    if text.is_empty() {
        return Err(SearchError::Parse("no extractable content found".into()));
    }

    let text = truncate_chars(&text, DEFAULT_MAX_CHARS);
    let word_count = text.split_whitespace().count();

    Ok(PageContent {
        url: url.to_owned(),
        title,
        text,
        word_count,
    })
}

/// Extract up to `max` absolute image URLs from `<img src>` attributes.
///
/// Relative sources are resolved against `base_url`; sources whose path
/// does not end in a recognised image extension are ignored, as are
/// duplicates.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if `base_url` is not an absolute URL.
pub fn extract_image_urls(html: &str, base_url: &str, max: usize) -> Result<Vec<String>> {
    let base = Url::parse(base_url)
        .map_err(|e| SearchError::Parse(format!("invalid page URL {base_url}: {e}")))?;
    let img_re = Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["'][^>]*>"#)
        .map_err(|e| SearchError::Parse(format!("invalid img pattern: {e}")))?;

    let mut urls: Vec<String> = Vec::new();
    for caps in img_re.captures_iter(html) {
        let Some(src) = caps.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        let Ok(resolved) = base.join(src) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        let path = resolved.path().to_lowercase();
        if !IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            continue;
        }
        let resolved = resolved.to_string();
        if !urls.contains(&resolved) {
            urls.push(resolved);
        }
        if urls.len() >= max {
            break;
        }
    }
    Ok(urls)
}

/// First `sentences` sentences of `text`, cut to `max_chars` with a `...`
/// suffix when longer. `None` when the text is blank.
pub fn summarize(text: &str, sentences: usize, max_chars: usize) -> Option<String> {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return None;
    }

    let mut end = flat.len();
    let mut seen = 0;
    for (idx, ch) in flat.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            seen += 1;
            if seen == sentences {
                end = idx + ch.len_utf8();
                break;
            }
        }
    }
    let summary = flat[..end].trim();

    if summary.chars().count() > max_chars {
        let cut = truncate_chars(summary, max_chars);
        Some(format!("{}...", cut.trim_end()))
    } else {
        Some(summary.to_owned())
    }
}

/// Extract the page title from the `<title>` element.
fn extract_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
        .trim()
        .to_owned()
}

/// Text of the main content area, falling back to `<body>`.
fn extract_main_text(document: &Html) -> String {
    let content_selectors = ["article", "main", "[role=\"main\"]", "body"];

    for selector_str in &content_selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text: String = element.text().collect::<Vec<_>>().join(" ");
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return trimmed.to_owned();
            }
        }
    }

    String::new()
}

/// Remove `<script>`, `<style>`, `<nav>`, `<footer>`, `<header>`, `<aside>`,
/// `<noscript>`, `<svg>` and `<iframe>` elements including their content.
fn strip_boilerplate_tags(html: &str) -> String {
    let tags = [
        "script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe",
    ];

    let mut result = html.to_owned();
    for tag in &tags {
        result = strip_tag(&result, tag);
    }
    result
}

/// Remove all instances of one tag and its content (case-insensitive).
fn strip_tag(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let lower = html.to_ascii_lowercase();
    let open_tag = format!("<{tag}");
    let close_tag = format!("</{tag}>");

    let mut pos = 0;
    loop {
        let start = match lower[pos..].find(&open_tag) {
            Some(offset) => pos + offset,
            None => {
                result.push_str(&html[pos..]);
                break;
            }
        };

        // Not the target tag (e.g. <navigate> for <nav>).
        let after_tag = start + open_tag.len();
        if after_tag < lower.len() {
            let next_byte = lower.as_bytes()[after_tag];
            if !matches!(next_byte, b' ' | b'>' | b'/' | b'\n' | b'\r' | b'\t') {
                result.push_str(&html[pos..after_tag]);
                pos = after_tag;
                continue;
            }
        }

        result.push_str(&html[pos..start]);

        let end = match lower[start..].find(&close_tag) {
            Some(offset) => start + offset + close_tag.len(),
            None => match lower[start..].find('>') {
                Some(offset) => start + offset + 1,
                None => html.len(),
            },
        };

        pos = end;
    }

    result
}

/// Collapse runs of spaces to one and 3+ newlines to 2.
fn normalise_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_space = false;
    let mut newline_count: u32 = 0;

    for ch in text.chars() {
        if ch == '\n' || ch == '\r' {
            newline_count += 1;
            prev_was_space = false;
            if newline_count <= 2 {
                result.push('\n');
            }
        } else if ch.is_whitespace() {
            newline_count = 0;
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            newline_count = 0;
            prev_was_space = false;
            result.push(ch);
        }
    }

    result
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_owned(),
        None => text.to_owned(),
    }
}
