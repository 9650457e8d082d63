//! Configuration types for search, storage and asset normalisation.

use serde::{Deserialize, Serialize};
use shellcraft_search::SearchConfig;
use shellcraft_search::providers::custom_search::{API_KEY_ENV, ENGINE_ID_ENV};
use shellcraft_search::providers::page_extraction::DEFAULT_SEED_URLS;
use std::path::PathBuf;

use crate::error::{Result, ShellcraftError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellcraftConfig {
    /// Orchestrator and provider behaviour.
    pub search: SearchConfig,
    /// Which providers are enabled, and their credentials.
    pub providers: ProviderSettings,
    /// Where records and assets live.
    pub storage: StorageConfig,
    /// Asset download and normalisation.
    pub images: ImageConfig,
}

/// Provider selection and credentials.
///
/// The metered provider is only built when both credentials are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Custom Search JSON API key. Usually supplied via the environment.
    pub custom_search_api_key: Option<String>,
    /// Custom Search engine id (`cx`).
    pub custom_search_engine_id: Option<String>,
    /// Override for the Custom Search endpoint.
    pub custom_search_endpoint: Option<String>,
    pub bing: bool,
    pub duckduckgo: bool,
    pub etsy: bool,
    pub page_extraction: bool,
    /// Pages fetched by the extraction provider. `{query}` is replaced
    /// with the encoded search query.
    pub seed_urls: Vec<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            custom_search_api_key: None,
            custom_search_engine_id: None,
            custom_search_endpoint: None,
            bing: true,
            duckduckgo: true,
            etsy: true,
            page_extraction: true,
            seed_urls: DEFAULT_SEED_URLS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl ProviderSettings {
    /// Both Custom Search credentials, when present and non-blank.
    pub fn custom_search_credentials(&self) -> Option<(&str, &str)> {
        let key = self.custom_search_api_key.as_deref()?.trim();
        let cx = self.custom_search_engine_id.as_deref()?.trim();
        (!key.is_empty() && !cx.is_empty()).then_some((key, cx))
    }
}

/// Record and asset storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the store: `metadata.json` plus `images/`.
    pub data_dir: PathBuf,
    /// Ingestion stops adding to a category once it holds this many records.
    pub max_images_per_category: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_images_per_category: 100,
        }
    }
}

impl StorageConfig {
    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join("metadata.json")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }
}

/// Asset download and normalisation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Images wider than this are downscaled (aspect preserved).
    pub max_width: u32,
    /// JPEG quality for normalised assets (1-100).
    pub quality: u8,
    /// Timeout for one asset download.
    pub download_timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            quality: 85,
            download_timeout_secs: 30,
        }
    }
}

impl ShellcraftConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ShellcraftError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ShellcraftError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/shellcraft/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("shellcraft").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("shellcraft")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/shellcraft-config/config.toml")
        }
    }

    /// Load from `path` (or the default path when it exists), apply
    /// environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file cannot be loaded or the result
    /// fails validation.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_config_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override secrets and tunables from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override secrets and tunables from `lookup`. Unparseable numbers
    /// are logged and ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV) {
            self.providers.custom_search_api_key = Some(key);
        }
        if let Some(cx) = lookup(ENGINE_ID_ENV) {
            self.providers.custom_search_engine_id = Some(cx);
        }
        if let Some(dir) = lookup("SHELLCRAFT_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(max) = parse_env(&lookup, "SHELLCRAFT_MAX_IMAGES_PER_CATEGORY") {
            self.storage.max_images_per_category = max;
        }
        if let Some(delay) = parse_env(&lookup, "SHELLCRAFT_SCRAPE_DELAY_MS") {
            self.search.min_interval_ms = delay;
        }
        if let Some(width) = parse_env(&lookup, "SHELLCRAFT_IMAGE_MAX_WIDTH") {
            self.images.max_width = width;
        }
        if let Some(quality) = parse_env(&lookup, "SHELLCRAFT_IMAGE_QUALITY") {
            self.images.quality = quality;
        }
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Config`] or a wrapped search config error.
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        if self.images.max_width == 0 {
            return Err(ShellcraftError::Config(
                "images.max_width must be greater than 0".into(),
            ));
        }
        if !(1..=100).contains(&self.images.quality) {
            return Err(ShellcraftError::Config(
                "images.quality must be between 1 and 100".into(),
            ));
        }
        if self.images.download_timeout_secs == 0 {
            return Err(ShellcraftError::Config(
                "images.download_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.storage.max_images_per_category == 0 {
            return Err(ShellcraftError::Config(
                "storage.max_images_per_category must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".shellcraft"))
        .unwrap_or_else(|| PathBuf::from(".shellcraft"))
}
