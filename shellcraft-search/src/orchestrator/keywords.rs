//! Keyword-suggester seam for image-upload searches.
//!
//! There is no visual similarity search here. An external service may look
//! at the uploaded image and suggest words; those words are turned into
//! ordinary text queries. The service itself is out of scope and is
//! consumed only through [`KeywordSuggester`].

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// What a suggester says about an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordHints {
    /// One-line description of the pictured item.
    pub description: String,
    /// Most relevant keywords first.
    pub keywords: Vec<String>,
    /// Style words such as "rustic" or "coastal".
    pub style_tags: Vec<String>,
}

impl KeywordHints {
    /// Generic hints for when a suggester answers without content.
    pub fn generic() -> Self {
        Self {
            description: String::new(),
            keywords: vec!["handmade".into(), "craft".into(), "decorative".into()],
            style_tags: vec!["artisan".into(), "handcrafted".into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.description.trim().is_empty() && self.keywords.is_empty() && self.style_tags.is_empty()
    }
}

/// Opaque image-to-keywords service.
#[async_trait]
pub trait KeywordSuggester: Send + Sync {
    /// Suggest keywords for the image at `image_path`, optionally steered
    /// by the user's own keywords.
    ///
    /// # Errors
    ///
    /// Any error makes the orchestrator fall back to its fixed query set.
    async fn suggest(
        &self,
        image_path: &Path,
        user_keywords: &str,
    ) -> Result<KeywordHints, SearchError>;
}
