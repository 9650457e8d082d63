//! Startup wiring: builds the provider chain, the orchestrator and the
//! stores from a [`ShellcraftConfig`].
//!
//! Nothing here is global. Each call returns a fresh set of services that
//! own their caches, pacers and locks.

use std::sync::Arc;

use shellcraft_search::providers::{
    BingImagesProvider, CustomSearchProvider, DuckDuckGoImagesProvider, EtsyProvider,
    PageExtractionProvider,
};
use shellcraft_search::{KeywordSuggester, Orchestrator, SearchProvider};

use crate::config::{ProviderSettings, ShellcraftConfig};
use crate::error::{Result, ShellcraftError};
use crate::ingest::IngestionCoordinator;
use crate::store::{AssetStore, RecordStore};

/// Everything a front end needs.
pub struct Services {
    pub config: ShellcraftConfig,
    pub orchestrator: Orchestrator,
    pub records: Arc<RecordStore>,
    pub ingestion: IngestionCoordinator,
}

impl Services {
    /// Wire up services from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is enabled, the search config is
    /// invalid, or the store cannot be opened.
    pub fn build(config: ShellcraftConfig) -> Result<Self> {
        Self::build_with_suggester(config, None)
    }

    /// Like [`Self::build`], with an image keyword suggester attached to
    /// the orchestrator.
    ///
    /// # Errors
    ///
    /// Same as [`Self::build`].
    pub fn build_with_suggester(
        config: ShellcraftConfig,
        suggester: Option<Arc<dyn KeywordSuggester>>,
    ) -> Result<Self> {
        let providers = build_providers(&config.providers);
        if providers.is_empty() {
            return Err(ShellcraftError::Config(
                "no search providers enabled".into(),
            ));
        }
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        tracing::info!(providers = ?names, "search providers configured");

        let mut orchestrator = Orchestrator::new(providers, config.search.clone())?;
        if let Some(suggester) = suggester {
            orchestrator = orchestrator.with_suggester(suggester);
        }

        let records = Arc::new(open_store(&config)?);
        let ingestion =
            IngestionCoordinator::new(Arc::clone(&records), config.storage.max_images_per_category);

        Ok(Self {
            config,
            orchestrator,
            records,
            ingestion,
        })
    }
}

/// Providers enabled in `settings`, in priority order.
///
/// The metered provider is included only when both credentials are set.
pub fn build_providers(settings: &ProviderSettings) -> Vec<Arc<dyn SearchProvider>> {
    let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();

    match settings.custom_search_credentials() {
        Some((key, cx)) => {
            let mut provider = CustomSearchProvider::new(key, cx);
            if let Some(endpoint) = settings.custom_search_endpoint.as_deref() {
                provider = provider.with_endpoint(endpoint);
            }
            providers.push(Arc::new(provider));
        }
        None => tracing::debug!("custom search credentials not set, metered provider disabled"),
    }

    if settings.bing {
        providers.push(Arc::new(BingImagesProvider::new()));
    }
    if settings.duckduckgo {
        providers.push(Arc::new(DuckDuckGoImagesProvider::new()));
    }
    if settings.etsy {
        providers.push(Arc::new(EtsyProvider::new()));
    }
    if settings.page_extraction {
        providers.push(Arc::new(PageExtractionProvider::new(settings.seed_urls.clone())));
    }

    providers
}

/// Open the record store and its asset directory under `storage.data_dir`.
///
/// # Errors
///
/// Returns an error if the directories cannot be created or an existing
/// metadata document is unreadable.
pub fn open_store(config: &ShellcraftConfig) -> Result<RecordStore> {
    let assets = AssetStore::open(config.storage.images_dir(), &config.images)?;
    RecordStore::open(config.storage.metadata_path(), assets)
}
