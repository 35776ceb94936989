//! Cached similarity search.
//!
//! Composes query-embedding generation, the store's similarity match, and
//! cache read/write around it. Embedding generation is the expensive step:
//! a cache hit returns the stored payload verbatim and never touches the
//! provider. Ranking is delegated to the store; results pass through in
//! the descending-similarity order it returns.

use anyhow::Result;

use crate::cache::{search_key, CacheLayer};
use crate::config::SearchConfig;
use crate::embedding::EmbeddingProvider;
use crate::models::SearchMatch;
use crate::store::DocumentStore;

/// Caller-supplied search options. Absent fields get the configured
/// defaults; present fields pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<i64>,
    pub threshold: Option<f64>,
    pub source: Option<String>,
    pub repository: Option<String>,
}

pub struct SearchService<'a> {
    store: &'a DocumentStore,
    provider: &'a dyn EmbeddingProvider,
    cache: &'a CacheLayer,
    config: &'a SearchConfig,
}

impl<'a> SearchService<'a> {
    pub fn new(
        store: &'a DocumentStore,
        provider: &'a dyn EmbeddingProvider,
        cache: &'a CacheLayer,
        config: &'a SearchConfig,
    ) -> Self {
        Self {
            store,
            provider,
            cache,
            config,
        }
    }

    /// Run a similarity search, serving from cache when possible.
    ///
    /// On a miss the query is embedded, matched against the store, and the
    /// result cached, but only when non-empty. Provider and store
    /// failures both propagate as search failures; no degraded result is
    /// synthesized.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchMatch>> {
        let limit = options.limit.unwrap_or(self.config.default_limit);
        let threshold = options.threshold.unwrap_or(self.config.default_threshold);

        let key = search_key(
            query,
            &[
                ("limit", limit.to_string()),
                ("repository", options.repository.clone().unwrap_or_default()),
                ("source", options.source.clone().unwrap_or_default()),
                ("threshold", threshold.to_string()),
            ],
        );

        if let Some(cached) = self.cache.get::<Vec<SearchMatch>>(&key).await {
            tracing::info!(query, "Search served from cache");
            return Ok(cached);
        }

        tracing::info!(query, "Search executing against store");
        let query_vec = self.provider.embed(query).await?;

        let results = self
            .store
            .match_documents(
                &query_vec,
                threshold,
                limit,
                options.source.as_deref(),
                options.repository.as_deref(),
            )
            .await?;

        if !results.is_empty() {
            self.cache.set(&key, &results, None).await;
        }

        Ok(results)
    }
}
