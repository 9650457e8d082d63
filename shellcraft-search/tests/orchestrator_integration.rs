//! Integration tests for the search orchestrator.
//!
//! Scripted in-process providers stand in for the real upstreams, so these
//! tests exercise fallback order, quota escalation, dedup, deadlines and
//! the upload-search query plans without network calls.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shellcraft_search::{
    Candidate, Category, KeywordHints, KeywordSuggester, Orchestrator, ProviderTier, SearchConfig,
    SearchError, SearchProvider,
};

#[derive(Clone)]
enum Script {
    Return(Vec<Candidate>),
    Quota,
    Fail,
    Slow(Duration, Vec<Candidate>),
}

struct ScriptedProvider {
    name: &'static str,
    tier: ProviderTier,
    script: Script,
    calls: AtomicUsize,
    queries: Mutex<Vec<(String, usize)>>,
}

impl ScriptedProvider {
    fn new(name: &'static str, tier: ProviderTier, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            tier,
            script,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn asked(&self) -> Vec<(String, usize)> {
        self.queries.lock().expect("lock").clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn tier(&self) -> ProviderTier {
        self.tier
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        _config: &SearchConfig,
    ) -> Result<Vec<Candidate>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .expect("lock")
            .push((query.to_owned(), limit));
        match &self.script {
            Script::Return(items) => Ok(items.clone()),
            Script::Quota => Err(SearchError::QuotaExhausted("HTTP 429".into())),
            Script::Fail => Err(SearchError::Http("connection refused".into())),
            Script::Slow(delay, items) => {
                tokio::time::sleep(*delay).await;
                Ok(items.clone())
            }
        }
    }
}

fn candidate(image: &str, provider: &str) -> Candidate {
    Candidate::new(
        format!("https://img.example.com/{image}.jpg"),
        format!("https://crafts.example.com/{image}"),
        "seashell frame",
        provider,
    )
    .with_title(format!("{image} via {provider}"))
}

fn quiet_config() -> SearchConfig {
    SearchConfig {
        request_delay_ms: (0, 0),
        min_interval_ms: 0,
        cache_ttl_seconds: 0,
        ..Default::default()
    }
}

fn orchestrator(providers: Vec<Arc<ScriptedProvider>>, config: SearchConfig) -> Orchestrator {
    let providers: Vec<Arc<dyn SearchProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn SearchProvider>)
        .collect();
    Orchestrator::new(providers, config).expect("valid orchestrator")
}

#[tokio::test]
async fn seashell_frame_overlap_returns_four_unique() {
    let first = ScriptedProvider::new(
        "First",
        ProviderTier::Scraping,
        Script::Return(vec![
            candidate("a", "First"),
            candidate("b", "First"),
            candidate("c", "First"),
        ]),
    );
    let second = ScriptedProvider::new(
        "Second",
        ProviderTier::Scraping,
        Script::Return(vec![
            candidate("b", "Second"),
            candidate("c", "Second"),
            candidate("d", "Second"),
        ]),
    );
    let orch = orchestrator(vec![first.clone(), second.clone()], quiet_config());

    let results = orch.search_all("seashell frame", 4).await.expect("search");

    assert_eq!(results.len(), 4);
    let images: Vec<&str> = results.iter().map(|c| c.image_url.as_str()).collect();
    assert_eq!(
        images,
        vec![
            "https://img.example.com/a.jpg",
            "https://img.example.com/b.jpg",
            "https://img.example.com/c.jpg",
            "https://img.example.com/d.jpg",
        ]
    );
    assert_eq!(results[1].provider, "First");
    assert_eq!(results[2].title, "c via First");
    assert_eq!(results[3].provider, "Second");
    assert_eq!(first.asked(), vec![("seashell frame".to_owned(), 2)]);
}

#[tokio::test]
async fn never_returns_duplicate_images() {
    let first = ScriptedProvider::new(
        "First",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("x", "First"), candidate("x", "First")]),
    );
    let second = ScriptedProvider::new(
        "Second",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("x", "Second"), candidate("y", "Second")]),
    );
    let orch = orchestrator(vec![first, second], quiet_config());

    let results = orch.search_all("q", 10).await.expect("search");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].provider, "First");
}

#[tokio::test]
async fn quota_exhaustion_escalates_to_next_provider() {
    let metered = ScriptedProvider::new("Metered", ProviderTier::Metered, Script::Quota);
    let scraper = ScriptedProvider::new(
        "Scraper",
        ProviderTier::Scraping,
        Script::Return((0..6).map(|i| candidate(&format!("s{i}"), "Scraper")).collect()),
    );
    let extractor = ScriptedProvider::new(
        "Extractor",
        ProviderTier::Extraction,
        Script::Return(vec![candidate("e0", "Extractor")]),
    );
    let orch = orchestrator(
        vec![extractor.clone(), scraper.clone(), metered.clone()],
        quiet_config(),
    );

    let results = orch.search_all("shell box", 6).await.expect("search");

    assert_eq!(metered.calls(), 1);
    // The scraper is asked for its own share plus the metered provider's.
    assert_eq!(scraper.asked(), vec![("shell box".to_owned(), 4)]);
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|c| c.provider == "Scraper"));
    assert_eq!(extractor.calls(), 0);

    // Parked for later calls too.
    let _ = orch.search_all("shell box", 6).await.expect("search");
    assert_eq!(metered.calls(), 1);
    assert_eq!(scraper.calls(), 2);
}

#[tokio::test]
async fn failing_provider_does_not_abort_search() {
    let broken = ScriptedProvider::new("Broken", ProviderTier::Scraping, Script::Fail);
    let working = ScriptedProvider::new(
        "Working",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("w1", "Working"), candidate("w2", "Working")]),
    );
    let orch = orchestrator(vec![broken.clone(), working.clone()], quiet_config());

    let results = orch.search_all("q", 4).await.expect("soft failure");
    assert_eq!(results.len(), 2);
    assert_eq!(broken.calls(), 1);
    assert_eq!(working.asked(), vec![("q".to_owned(), 4)]);
}

#[tokio::test]
async fn all_providers_failing_is_empty_not_error() {
    let a = ScriptedProvider::new("A", ProviderTier::Scraping, Script::Fail);
    let b = ScriptedProvider::new("B", ProviderTier::Extraction, Script::Fail);
    let orch = orchestrator(vec![a, b], quiet_config());
    let results = orch.search_all("q", 4).await.expect("no hard failure");
    assert!(results.is_empty());
}

#[tokio::test]
async fn stops_early_once_limit_reached() {
    let first = ScriptedProvider::new(
        "First",
        ProviderTier::Scraping,
        Script::Return((0..5).map(|i| candidate(&format!("f{i}"), "First")).collect()),
    );
    let second = ScriptedProvider::new(
        "Second",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("s0", "Second")]),
    );
    let orch = orchestrator(vec![first, second.clone()], quiet_config());

    let results = orch.search_all("q", 3).await.expect("search");
    assert_eq!(results.len(), 3);
    assert_eq!(second.calls(), 0);
}

#[tokio::test]
async fn invalid_candidates_are_discarded() {
    let mut no_source = candidate("bad", "First");
    no_source.source_url = String::new();
    let first = ScriptedProvider::new(
        "First",
        ProviderTier::Scraping,
        Script::Return(vec![no_source, candidate("good", "First")]),
    );
    let orch = orchestrator(vec![first], quiet_config());
    let results = orch.search_all("q", 5).await.expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].image_url, "https://img.example.com/good.jpg");
}

#[tokio::test]
async fn deadline_returns_accumulated_candidates() {
    let fast = ScriptedProvider::new(
        "Fast",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("fast", "Fast")]),
    );
    let slow = ScriptedProvider::new(
        "Slow",
        ProviderTier::Scraping,
        Script::Slow(
            Duration::from_secs(30),
            vec![candidate("slow", "Slow")],
        ),
    );
    let orch = orchestrator(vec![fast, slow.clone()], quiet_config());

    let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
    let started = std::time::Instant::now();
    let results = orch
        .search_all_within("q", 4, deadline)
        .await
        .expect("deadline is not an error");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(slow.calls(), 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].provider, "Fast");
}

#[tokio::test]
async fn parallel_mode_keeps_priority_order() {
    let first = ScriptedProvider::new(
        "First",
        ProviderTier::Scraping,
        Script::Slow(
            Duration::from_millis(150),
            vec![candidate("shared", "First"), candidate("f", "First")],
        ),
    );
    let second = ScriptedProvider::new(
        "Second",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("shared", "Second"), candidate("s", "Second")]),
    );
    let config = SearchConfig {
        parallel: true,
        max_concurrency: 2,
        ..quiet_config()
    };
    let orch = orchestrator(vec![first, second], config);

    let results = orch.search_all("q", 4).await.expect("search");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].provider, "First");
    assert_eq!(results[0].image_url, "https://img.example.com/shared.jpg");
    assert_eq!(results[2].provider, "Second");
}

#[tokio::test]
async fn category_search_uses_most_specific_query() {
    let provider = ScriptedProvider::new(
        "Only",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("frame", "Only")]),
    );
    let orch = orchestrator(vec![provider.clone()], quiet_config());

    orch.search_by_category(&Category::ShadowBoxes, 5)
        .await
        .expect("search");
    orch.search_by_category(&Category::from("wind_chimes"), 5)
        .await
        .expect("search");

    let asked: Vec<String> = provider.asked().into_iter().map(|(q, _)| q).collect();
    assert_eq!(asked, vec!["shell shadow box display", "wind chimes shell craft"]);
}

#[tokio::test]
async fn cache_serves_repeat_queries() {
    let provider = ScriptedProvider::new(
        "Only",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("a", "Only")]),
    );
    let config = SearchConfig {
        cache_ttl_seconds: 60,
        ..quiet_config()
    };
    let orch = orchestrator(vec![provider.clone()], config);

    orch.search_all("Shell Frame", 3).await.expect("search");
    orch.search_all("shell frame ", 3).await.expect("search");
    assert_eq!(provider.calls(), 1);
}

struct FixedSuggester(Result<KeywordHints, ()>);

#[async_trait]
impl KeywordSuggester for FixedSuggester {
    async fn suggest(
        &self,
        _image_path: &Path,
        _user_keywords: &str,
    ) -> Result<KeywordHints, SearchError> {
        self.0
            .clone()
            .map_err(|()| SearchError::Http("suggester offline".into()))
    }
}

#[tokio::test]
async fn similar_search_blends_hints_with_user_keywords() {
    let provider = ScriptedProvider::new(
        "Only",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("a", "Only")]),
    );
    let hints = KeywordHints {
        description: "scallop shell mirror".into(),
        keywords: vec!["mirror".into(), "scallop".into()],
        style_tags: vec!["rustic".into()],
    };
    let orch = orchestrator(vec![provider.clone()], quiet_config())
        .with_suggester(Arc::new(FixedSuggester(Ok(hints))));

    let results = orch
        .search_similar(Path::new("/tmp/upload.jpg"), "gold", 8)
        .await
        .expect("search");

    assert_eq!(results.len(), 1);
    assert_eq!(
        provider.asked(),
        vec![
            ("scallop shell mirror gold".to_owned(), 2),
            ("mirror gold".to_owned(), 2),
            ("scallop gold".to_owned(), 2),
            ("rustic gold".to_owned(), 2),
        ]
    );
}

#[tokio::test]
async fn similar_search_falls_back_when_suggester_fails() {
    let provider = ScriptedProvider::new(
        "Only",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("a", "Only")]),
    );
    let orch = orchestrator(vec![provider.clone()], quiet_config())
        .with_suggester(Arc::new(FixedSuggester(Err(()))));

    orch.search_similar(Path::new("/tmp/upload.jpg"), "", 4)
        .await
        .expect("search");

    let asked: Vec<String> = provider.asked().into_iter().map(|(q, _)| q).collect();
    assert_eq!(
        asked,
        vec![
            "handmade crafts decorative",
            "artisan handcrafted items",
            "DIY craft projects",
            "decorative art pieces",
        ]
    );
}

#[tokio::test]
async fn related_search_splits_limit_across_fixed_queries() {
    let provider = ScriptedProvider::new(
        "Only",
        ProviderTier::Scraping,
        Script::Return(vec![candidate("a", "Only"), candidate("b", "Only")]),
    );
    let orch = orchestrator(vec![provider.clone()], quiet_config());

    let results = orch.search_related(2).await.expect("search");

    // Each query gets a share of one, and every share returns "a".
    assert_eq!(results.len(), 1);
    let asked = provider.asked();
    assert_eq!(asked.len(), 4);
    assert!(asked.iter().all(|(_, limit)| *limit == 1));
    assert_eq!(asked[0].0, "handmade shell picture frames crafts");
}
