//! Core types for image search candidates, platforms and categories.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Title used when a provider supplies none.
pub const DEFAULT_TITLE: &str = "Shell Craft";

/// Deterministic 32-hex-char identifier derived from `key`.
///
/// Same input, same id, across runs and processes.
pub fn content_id(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(32);
    hex
}

/// A prospective image result before ingestion.
///
/// Both `image_url` and `source_url` are required; see [`Candidate::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Source-provided identifier. Set by providers that derive several
    /// candidates from one page so they do not collide on `source_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable title.
    pub title: String,
    /// Direct URL of the image. Dedup key.
    pub image_url: String,
    /// The page the image was found on.
    pub source_url: String,
    /// Platform derived from the `source_url` domain.
    pub platform: Platform,
    /// Optional description or snippet.
    #[serde(default)]
    pub description: Option<String>,
    /// Query that produced this candidate.
    pub search_query: String,
    /// Name of the provider that produced this candidate.
    #[serde(default)]
    pub provider: String,
}

impl Candidate {
    /// Build a candidate with the default title and a platform derived
    /// from `source_url`.
    pub fn new(
        image_url: impl Into<String>,
        source_url: impl Into<String>,
        search_query: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        let source_url = source_url.into();
        Self {
            id: None,
            title: DEFAULT_TITLE.to_owned(),
            image_url: image_url.into(),
            platform: Platform::from_url(&source_url),
            source_url,
            description: None,
            search_query: search_query.into(),
            provider: provider.into(),
        }
    }

    /// Set the title, keeping the placeholder if `title` is blank.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        let trimmed = title.trim();
        if !trimmed.is_empty() {
            self.title = trimmed.to_owned();
        }
        self
    }

    /// Set the description, ignoring blank values.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        let trimmed = description.trim();
        if !trimmed.is_empty() {
            self.description = Some(trimmed.to_owned());
        }
        self
    }

    /// Set a source-provided id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Check that both required URLs are present.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SearchError::Validation`] naming the missing field.
    pub fn validate(&self) -> crate::Result<()> {
        if self.image_url.trim().is_empty() {
            return Err(crate::SearchError::Validation(format!(
                "missing image_url (source {})",
                self.source_url
            )));
        }
        if self.source_url.trim().is_empty() {
            return Err(crate::SearchError::Validation(format!(
                "missing source_url (image {})",
                self.image_url
            )));
        }
        Ok(())
    }
}

/// Where a candidate's source page lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    Pinterest,
    Etsy,
    Amazon,
    Instagram,
    Facebook,
    YouTube,
    Flickr,
    Ebay,
    Craftsy,
    Michaels,
    Joann,
    /// Any other site.
    Web,
}

/// Domain keyword → platform, checked in order against the URL host.
const PLATFORM_DOMAINS: &[(&str, Platform)] = &[
    ("pinterest", Platform::Pinterest),
    ("etsy", Platform::Etsy),
    ("amazon", Platform::Amazon),
    ("instagram", Platform::Instagram),
    ("facebook", Platform::Facebook),
    ("youtube", Platform::YouTube),
    ("flickr", Platform::Flickr),
    ("ebay", Platform::Ebay),
    ("craftsy", Platform::Craftsy),
    ("michaels", Platform::Michaels),
    ("joann", Platform::Joann),
];

impl Platform {
    /// Detect the platform from a page URL. Unparseable or unknown URLs
    /// map to [`Platform::Web`].
    pub fn from_url(url: &str) -> Self {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
        else {
            return Self::Web;
        };
        PLATFORM_DOMAINS
            .iter()
            .find(|(keyword, _)| host.contains(keyword))
            .map_or(Self::Web, |(_, platform)| *platform)
    }

    /// Display name, also the serialized form.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pinterest => "Pinterest",
            Self::Etsy => "Etsy",
            Self::Amazon => "Amazon",
            Self::Instagram => "Instagram",
            Self::Facebook => "Facebook",
            Self::YouTube => "YouTube",
            Self::Flickr => "Flickr",
            Self::Ebay => "eBay",
            Self::Craftsy => "Craftsy",
            Self::Michaels => "Michaels",
            Self::Joann => "JOANN",
            Self::Web => "Web",
        }
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        PLATFORM_DOMAINS
            .iter()
            .map(|(_, p)| *p)
            .find(|p| p.name().eq_ignore_ascii_case(&value))
            .unwrap_or(Self::Web)
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.name().to_owned()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Record category. The first four are the classifiable set; the rest
/// are free-form buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    PictureFrames,
    ShadowBoxes,
    JewelryBoxes,
    DisplayCases,
    /// Results of a plain text search.
    SearchResults,
    /// Results of an image-upload search.
    UploadSearch,
    /// Any other bucket name, kept verbatim.
    Other(String),
}

impl Category {
    /// The four categories the categorizer can assign, in tie-break order.
    pub const FIXED: [Category; 4] = [
        Category::PictureFrames,
        Category::ShadowBoxes,
        Category::JewelryBoxes,
        Category::DisplayCases,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::PictureFrames => "picture_frames",
            Self::ShadowBoxes => "shadow_boxes",
            Self::JewelryBoxes => "jewelry_boxes",
            Self::DisplayCases => "display_cases",
            Self::SearchResults => "search_results",
            Self::UploadSearch => "upload_search",
            Self::Other(name) => name,
        }
    }

    /// Whether this is one of the four classifiable categories.
    pub fn is_fixed(&self) -> bool {
        Self::FIXED.contains(self)
    }

    /// Pre-built queries for this category, most specific first.
    pub fn queries(&self) -> Vec<String> {
        let fixed: &[&str] = match self {
            Self::PictureFrames => &[
                "shell picture frame handmade",
                "seashell photo frame craft",
                "coastal picture frame shells",
            ],
            Self::ShadowBoxes => &[
                "shell shadow box display",
                "seashell memory box craft",
                "beach shadow box shells",
            ],
            Self::JewelryBoxes => &[
                "shell jewelry box handmade",
                "seashell treasure box craft",
                "coastal jewelry box shells",
            ],
            Self::DisplayCases => &[
                "shell collection display case",
                "seashell specimen display",
                "shell museum display craft",
            ],
            other => return vec![format!("{} shell craft", other.as_str().replace('_', " "))],
        };
        fixed.iter().map(|q| (*q).to_owned()).collect()
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "picture_frames" => Self::PictureFrames,
            "shadow_boxes" => Self::ShadowBoxes,
            "jewelry_boxes" => Self::JewelryBoxes,
            "display_cases" => Self::DisplayCases,
            "search_results" => Self::SearchResults,
            "upload_search" => Self::UploadSearch,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Cost/reliability tier. Providers are queried in tier order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderTier {
    /// Quota-metered structured API. Cheapest per result and most precise.
    Metered,
    /// Unmetered scraping of search engine or marketplace result pages.
    Scraping,
    /// Raw page fetch plus content extraction. Last resort.
    Extraction,
}

impl fmt::Display for ProviderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Metered => "metered",
            Self::Scraping => "scraping",
            Self::Extraction => "extraction",
        })
    }
}
