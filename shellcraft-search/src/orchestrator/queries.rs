//! Query builders for related-term and image-upload searches.

use super::keywords::KeywordHints;

/// Fixed related-term queries for browsing without an image.
pub const RELATED_QUERIES: &[&str] = &[
    "handmade shell picture frames crafts",
    "seashell shadow box display",
    "coastal shell jewelry box",
    "beach decor shell crafts DIY",
];

/// Queries used for an image-upload search when no keyword hints exist.
pub const FALLBACK_QUERIES: &[&str] = &[
    "handmade crafts decorative",
    "artisan handcrafted items",
    "DIY craft projects",
    "decorative art pieces",
];

/// Upper bound on queries issued for one image-upload search.
pub const MAX_SIMILAR_QUERIES: usize = 4;

/// Build queries from suggester hints blended with the user's keywords.
///
/// Order: description (+ user keywords), then up to three hint keywords
/// paired with the user keywords (only when the user gave some), then up
/// to two style tags. Blank queries are dropped; at most
/// [`MAX_SIMILAR_QUERIES`] are returned.
pub fn hint_queries(hints: &KeywordHints, user_keywords: &str) -> Vec<String> {
    let user = user_keywords.trim();
    let mut queries = vec![join(hints.description.trim(), user)];

    if !user.is_empty() {
        queries.extend(hints.keywords.iter().take(3).map(|k| join(k.trim(), user)));
    }

    for tag in hints.style_tags.iter().take(2) {
        let suffix = if user.is_empty() { "handmade craft" } else { user };
        queries.push(join(tag.trim(), suffix));
    }

    finish(queries)
}

/// The fixed fallback set, each suffixed with the user's keywords.
pub fn fallback_queries(user_keywords: &str) -> Vec<String> {
    let user = user_keywords.trim();
    finish(FALLBACK_QUERIES.iter().map(|q| join(q, user)).collect())
}

/// Per-query share of `limit` across `n` queries, at least 1.
pub fn per_query_limit(limit: usize, n: usize) -> usize {
    (limit / n.max(1)).max(1)
}

fn join(head: &str, tail: &str) -> String {
    format!("{head} {tail}").trim().to_owned()
}

fn finish(queries: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for q in queries {
        if !q.is_empty() && !out.contains(&q) {
            out.push(q);
        }
    }
    out.truncate(MAX_SIMILAR_QUERIES);
    out
}
