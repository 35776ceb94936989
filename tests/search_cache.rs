//! Tests for the cached search path.
//!
//! Uses an embedding provider with orthogonal keyword vectors so
//! similarity scores are exact: documents and queries sharing a keyword
//! score 1.0, everything else scores 0.0. Provider invocations are
//! counted to prove cache hits skip embedding entirely.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use docvault::cache::CacheLayer;
use docvault::config::{CacheConfig, EmbeddingConfig, SearchConfig};
use docvault::embedding::{EmbeddingError, EmbeddingProvider};
use docvault::indexer::EmbeddingIndexer;
use docvault::models::FetchedFile;
use docvault::search::{SearchOptions, SearchService};
use docvault::store::DocumentStore;
use docvault::{db, migrate};

/// Maps texts to fixed orthogonal unit vectors by keyword.
struct KeywordProvider {
    calls: AtomicUsize,
}

impl KeywordProvider {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordProvider {
    fn model_name(&self) -> &str {
        "keyword-embedder"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                if text.contains("alpha") {
                    vec![1.0, 0.0, 0.0]
                } else if text.contains("beta") {
                    vec![0.0, 1.0, 0.0]
                } else {
                    vec![0.0, 0.0, 1.0]
                }
            })
            .collect())
    }
}

struct Fixture {
    _tmp: TempDir,
    store: DocumentStore,
    provider: KeywordProvider,
    cache: CacheLayer,
    search_config: SearchConfig,
    embedding_config: EmbeddingConfig,
}

impl Fixture {
    fn service(&self) -> SearchService<'_> {
        SearchService::new(&self.store, &self.provider, &self.cache, &self.search_config)
    }

    fn indexer(&self) -> EmbeddingIndexer<'_> {
        EmbeddingIndexer::new(
            &self.store,
            &self.provider,
            &self.cache,
            &self.embedding_config,
        )
    }

    async fn add_document(&self, source: &str, repository: &str, path: &str, content: &str) {
        self.store
            .upsert_document(
                source,
                repository,
                &FetchedFile {
                    path: path.to_string(),
                    sha: format!("sha-{}", path),
                    content: content.to_string(),
                    metadata_json: "{}".to_string(),
                },
            )
            .await
            .unwrap();
    }
}

async fn fixture(cache_enabled: bool) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let pool: SqlitePool = db::connect(&tmp.path().join("vault.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    let cache = if cache_enabled {
        CacheLayer::new(&CacheConfig::default())
    } else {
        CacheLayer::disabled()
    };

    Fixture {
        _tmp: tmp,
        store: DocumentStore::new(pool),
        provider: KeywordProvider::new(),
        cache,
        search_config: SearchConfig::default(),
        embedding_config: EmbeddingConfig::default(),
    }
}

/// Seed two indexed documents: one about "alpha", one about "beta".
async fn seed_corpus(fx: &Fixture) {
    fx.add_document("github", "acme/platform", "alpha.md", "notes about alpha service")
        .await;
    fx.add_document("github", "acme/platform", "beta.md", "notes about beta service")
        .await;
    fx.indexer().index_unindexed().await.unwrap();
}

#[tokio::test]
async fn test_search_matches_above_threshold_only() {
    let fx = fixture(false).await;
    seed_corpus(&fx).await;

    let results = fx
        .service()
        .search("alpha deployment", &SearchOptions::default())
        .await
        .unwrap();

    // alpha.md scores 1.0, beta.md scores 0.0 and falls below 0.7
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].path, "alpha.md");
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_search_repository_filter() {
    let fx = fixture(false).await;
    fx.add_document("github", "acme/platform", "alpha.md", "alpha in platform")
        .await;
    fx.add_document("github", "acme/website", "alpha-too.md", "alpha in website")
        .await;
    fx.indexer().index_unindexed().await.unwrap();

    let options = SearchOptions {
        repository: Some("acme/website".to_string()),
        ..Default::default()
    };
    let results = fx.service().search("alpha", &options).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].repository, "acme/website");
}

#[tokio::test]
async fn test_search_source_filter() {
    let fx = fixture(false).await;
    fx.add_document("github", "acme/platform", "alpha.md", "alpha from github")
        .await;
    fx.add_document("local", "workspace", "alpha-local.md", "alpha from disk")
        .await;
    fx.indexer().index_unindexed().await.unwrap();

    let options = SearchOptions {
        source: Some("local".to_string()),
        ..Default::default()
    };
    let results = fx.service().search("alpha", &options).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source, "local");
}

#[tokio::test]
async fn test_search_limit_caps_results() {
    let fx = fixture(false).await;
    for i in 0..5 {
        fx.add_document(
            "github",
            "acme/platform",
            &format!("alpha-{}.md", i),
            "alpha content",
        )
        .await;
    }
    fx.indexer().index_unindexed().await.unwrap();

    let options = SearchOptions {
        limit: Some(3),
        ..Default::default()
    };
    let results = fx.service().search("alpha", &options).await.unwrap();
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn test_cache_hit_skips_the_provider() {
    let fx = fixture(true).await;
    seed_corpus(&fx).await;
    let calls_after_indexing = fx.provider.call_count();

    let first = fx
        .service()
        .search("alpha deployment", &SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(fx.provider.call_count(), calls_after_indexing + 1);

    let second = fx
        .service()
        .search("alpha deployment", &SearchOptions::default())
        .await
        .unwrap();

    // Second search is served from cache: no new provider call
    assert_eq!(fx.provider.call_count(), calls_after_indexing + 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_differing_options_do_not_share_cache_entries() {
    let fx = fixture(true).await;
    seed_corpus(&fx).await;
    let baseline = fx.provider.call_count();

    let strict = SearchOptions {
        threshold: Some(0.9),
        ..Default::default()
    };
    let lax = SearchOptions {
        threshold: Some(0.1),
        ..Default::default()
    };

    fx.service().search("alpha", &strict).await.unwrap();
    fx.service().search("alpha", &lax).await.unwrap();

    // Different thresholds are different requests: both embed
    assert_eq!(fx.provider.call_count(), baseline + 2);
}

#[tokio::test]
async fn test_indexing_invalidates_cached_searches() {
    let fx = fixture(true).await;
    seed_corpus(&fx).await;

    let options = SearchOptions::default();
    let before = fx.service().search("alpha", &options).await.unwrap();
    assert_eq!(before.len(), 1);

    // A new matching document arrives and gets indexed
    fx.add_document("github", "acme/platform", "alpha-2.md", "more alpha notes")
        .await;
    let indexed = fx.indexer().index_unindexed().await.unwrap();
    assert_eq!(indexed, 1);

    let after = fx.service().search("alpha", &options).await.unwrap();
    assert_eq!(after.len(), 2);
}

#[tokio::test]
async fn test_empty_results_are_not_cached() {
    let fx = fixture(true).await;
    seed_corpus(&fx).await;
    let baseline = fx.provider.call_count();

    let options = SearchOptions::default();
    let first = fx.service().search("gamma rays", &options).await.unwrap();
    assert!(first.is_empty());

    let second = fx.service().search("gamma rays", &options).await.unwrap();
    assert!(second.is_empty());

    // Both searches hit the provider: empty results never populate the cache
    assert_eq!(fx.provider.call_count(), baseline + 2);
}

#[tokio::test]
async fn test_disabled_cache_is_transparent() {
    let fx = fixture(false).await;
    seed_corpus(&fx).await;
    let baseline = fx.provider.call_count();

    let options = SearchOptions::default();
    let first = fx.service().search("alpha", &options).await.unwrap();
    let second = fx.service().search("alpha", &options).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fx.provider.call_count(), baseline + 2);
}

#[tokio::test]
async fn test_results_ranked_by_similarity() {
    let fx = fixture(false).await;
    fx.add_document("github", "acme/platform", "exact.md", "alpha").await;
    fx.add_document("github", "acme/platform", "other.md", "beta").await;
    fx.indexer().index_unindexed().await.unwrap();

    let options = SearchOptions {
        threshold: Some(0.0),
        ..Default::default()
    };
    let results = fx.service().search("alpha", &options).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].similarity >= results[1].similarity);
    assert_eq!(results[0].path, "exact.md");
}
