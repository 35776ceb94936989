//! Embedding indexer.
//!
//! Generates vectors for documents that lack one and persists them in
//! fixed-size sub-batches. Vector generation fans out in parallel within
//! a sub-batch (bounded by the sub-batch size, to respect provider rate
//! limits); results are joined, partitioned into successes and failures,
//! and the successes are upserted as one batch. A failed sub-batch is
//! logged and skipped; partial completion is expected, and repeated runs
//! converge until nothing is left unindexed.

use anyhow::Result;
use futures::future::join_all;

use crate::cache::CacheLayer;
use crate::config::EmbeddingConfig;
use crate::embedding::{truncate_for_embedding, EmbeddingProvider};
use crate::store::DocumentStore;

pub struct EmbeddingIndexer<'a> {
    store: &'a DocumentStore,
    provider: &'a dyn EmbeddingProvider,
    cache: &'a CacheLayer,
    config: &'a EmbeddingConfig,
}

impl<'a> EmbeddingIndexer<'a> {
    pub fn new(
        store: &'a DocumentStore,
        provider: &'a dyn EmbeddingProvider,
        cache: &'a CacheLayer,
        config: &'a EmbeddingConfig,
    ) -> Self {
        Self {
            store,
            provider,
            cache,
            config,
        }
    }

    /// Generate and store the embedding for a single document.
    ///
    /// Content beyond the character budget is dropped before the provider
    /// call: long documents are embedded on a prefix only, a deliberate
    /// cost/latency tradeoff. Provider errors propagate to the caller
    /// unmodified; there is no retry here.
    pub async fn index_document(&self, document_id: &str, content: &str) -> Result<()> {
        let truncated = truncate_for_embedding(content, self.config.truncation_limit);
        let vector = self.provider.embed(truncated).await?;

        self.store
            .upsert_embedding(document_id, &vector, self.provider.model_name())
            .await?;

        tracing::debug!(document_id, "Document indexed");
        self.cache.invalidate_search().await;
        Ok(())
    }

    /// Index up to `max_unindexed_per_run` documents that have no
    /// embedding, in parallel sub-batches of `batch_size`.
    ///
    /// Returns the number of documents successfully embedded and stored,
    /// not the number attempted. Calling this repeatedly until it returns
    /// 0 converges absent a persistent provider failure.
    pub async fn index_unindexed(&self) -> Result<usize> {
        let pending = self
            .store
            .find_unindexed(self.config.max_unindexed_per_run)
            .await?;

        if pending.is_empty() {
            tracing::info!("No unindexed documents found");
            return Ok(0);
        }

        tracing::info!(count = pending.len(), "Indexing unindexed documents");

        let mut indexed = 0usize;

        for (batch_index, batch) in pending.chunks(self.config.batch_size).enumerate() {
            let generations = join_all(batch.iter().map(|doc| async {
                let truncated = truncate_for_embedding(&doc.content, self.config.truncation_limit);
                self.provider.embed(truncated).await
            }))
            .await;

            // Partition: failed generations are logged and dropped,
            // successful siblings still get written
            let mut successes: Vec<(String, Vec<f32>)> = Vec::with_capacity(batch.len());
            for (doc, result) in batch.iter().zip(generations) {
                match result {
                    Ok(vector) => successes.push((doc.id.clone(), vector)),
                    Err(e) => {
                        tracing::error!(
                            document_id = %doc.id,
                            batch = batch_index,
                            error = %e,
                            "Failed to generate embedding"
                        );
                    }
                }
            }

            if successes.is_empty() {
                continue;
            }

            match self
                .store
                .upsert_embeddings(&successes, self.provider.model_name())
                .await
            {
                Ok(()) => {
                    indexed += successes.len();
                    tracing::debug!(
                        batch = batch_index,
                        batch_indexed = successes.len(),
                        total_indexed = indexed,
                        "Sub-batch indexed"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        batch = batch_index,
                        batch_size = successes.len(),
                        error = %format!("{:#}", e),
                        "Failed to store embedding sub-batch"
                    );
                    // Continue with the next sub-batch
                }
            }
        }

        tracing::info!(indexed, "Finished indexing unindexed documents");

        // Cached search results may now rank differently
        if indexed > 0 {
            self.cache.invalidate_search().await;
        }

        Ok(indexed)
    }
}
