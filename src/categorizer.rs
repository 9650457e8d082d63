//! Keyword categorizer for shell craft records.
//!
//! Scores each classifiable category by how many of its keywords appear in
//! the lowercased text. Highest score wins; ties go to the earlier category
//! in table order, and text with no hits falls back to picture frames.

use shellcraft_search::{Candidate, Category};

// ── Keyword table ───────────────────────────────────────────────────────

/// (category, keywords). Order is the tie-break order.
const CATEGORY_TABLE: &[(&str, &[&str])] = &[
    (
        "picture_frames",
        &["picture frame", "photo frame", "frame", "picture", "photo"],
    ),
    (
        "shadow_boxes",
        &["shadow box", "display box", "memory box", "collection box"],
    ),
    (
        "jewelry_boxes",
        &["jewelry box", "storage box", "keepsake box", "treasure box"],
    ),
    (
        "display_cases",
        &["display case", "specimen", "museum", "educational", "exhibit"],
    ),
];

/// Category assigned when no keyword matches.
pub const DEFAULT_CATEGORY: &str = "picture_frames";

/// Classify free text into one of the four fixed categories.
pub fn classify(text: &str) -> Category {
    let lower = text.to_lowercase();

    let mut best = DEFAULT_CATEGORY;
    let mut best_score: usize = 0;

    for &(category, keywords) in CATEGORY_TABLE {
        let score = keywords.iter().filter(|kw| lower.contains(*kw)).count();
        if score > best_score {
            best_score = score;
            best = category;
        }
    }

    Category::from(best)
}

/// Classify a candidate by its title and description.
pub fn classify_candidate(candidate: &Candidate) -> Category {
    let description = candidate.description.as_deref().unwrap_or_default();
    classify(&format!("{} {description}", candidate.title))
}
