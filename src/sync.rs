//! Sync orchestration.
//!
//! Drives one adapter's listing through binary filtering, batched content
//! fetches, and hash-stable upserts into the document store, while
//! tracking per-repository status. Listing failures are fatal to the run;
//! per-file fetch failures are logged and skipped so one bad blob never
//! sinks a batch. A re-run over an unchanged source writes nothing.

use anyhow::{Context, Result};

use crate::adapter::SourceAdapter;
use crate::cache::CacheLayer;
use crate::config::SyncConfig;
use crate::models::{RemoteFile, SyncFileError, SyncOutcome, SyncState};
use crate::store::DocumentStore;

/// Run one sync pass over a single source identity.
///
/// Status lifecycle: `in_progress` at the start, `success` or `error` at
/// the end. A partially failed run still returns concrete counts. When at
/// least one write was committed, the repository's cache namespace is
/// invalidated even if the run later failed.
pub async fn sync_source(
    store: &DocumentStore,
    cache: &CacheLayer,
    adapter: &dyn SourceAdapter,
    config: &SyncConfig,
    dedupe_against_github: bool,
) -> Result<SyncOutcome> {
    let source = adapter.source().to_string();
    let repository = adapter.repository().to_string();

    tracing::info!(source = %source, repository = %repository, "Starting sync");
    store
        .set_sync_status(&source, &repository, SyncState::InProgress, None)
        .await?;

    let mut outcome = SyncOutcome::default();
    let result = run_inner(store, adapter, config, dedupe_against_github, &mut outcome).await;

    // Committed batches stay committed; anything cached over them is stale
    if outcome.processed > 0 {
        cache.invalidate_repository(&repository).await;
    }

    match result {
        Ok(()) => {
            store
                .set_sync_status(&source, &repository, SyncState::Success, None)
                .await?;
            tracing::info!(
                source = %source,
                repository = %repository,
                found = outcome.files_found,
                processed = outcome.processed,
                skipped = outcome.skipped,
                failed = outcome.failed,
                "Sync completed"
            );
            Ok(outcome)
        }
        Err(e) => {
            let message = format!("{:#}", e);
            store
                .set_sync_status(&source, &repository, SyncState::Error, Some(&message))
                .await?;
            tracing::error!(
                source = %source,
                repository = %repository,
                error = %message,
                "Sync failed"
            );
            Err(e)
        }
    }
}

async fn run_inner(
    store: &DocumentStore,
    adapter: &dyn SourceAdapter,
    config: &SyncConfig,
    dedupe_against_github: bool,
    outcome: &mut SyncOutcome,
) -> Result<()> {
    let source = adapter.source();
    let repository = adapter.repository();

    let listing = adapter
        .list_files()
        .await
        .with_context(|| format!("Failed to list files for {}/{}", source, repository))?;
    outcome.files_found = listing.len();

    // Binary files are never fetched
    let text_files: Vec<RemoteFile> = listing
        .into_iter()
        .filter(|f| {
            if is_binary_path(&f.path, &config.binary_extensions) {
                outcome.skipped += 1;
                false
            } else {
                true
            }
        })
        .collect();

    tracing::debug!(
        source,
        repository,
        total = outcome.files_found,
        text = text_files.len(),
        "Filtered listing"
    );

    for (batch_index, batch) in text_files.chunks(config.batch_size).enumerate() {
        for file in batch {
            // Local content redundant with the code-host origin is skipped
            if dedupe_against_github
                && source != "github"
                && store.sha_exists_for_source("github", &file.sha).await?
            {
                tracing::debug!(path = %file.path, "Skipping duplicate of GitHub document");
                outcome.skipped += 1;
                continue;
            }

            let fetched = match adapter.fetch(file).await {
                Ok(f) => f,
                Err(e) => {
                    tracing::warn!(
                        source,
                        repository,
                        path = %file.path,
                        batch = batch_index,
                        error = %format!("{:#}", e),
                        "Failed to fetch file, skipping"
                    );
                    outcome.failed += 1;
                    outcome.errors.push(SyncFileError {
                        path: file.path.clone(),
                        error: format!("{:#}", e),
                    });
                    continue;
                }
            };

            store
                .upsert_document(source, repository, &fetched)
                .await
                .with_context(|| format!("Failed to upsert document {}", fetched.path))?;
            outcome.processed += 1;
        }

        tracing::debug!(
            source,
            repository,
            batch = batch_index,
            processed = outcome.processed,
            "Batch processed"
        );
    }

    Ok(())
}

/// Whether a path's extension is on the binary denylist.
fn is_binary_path(path: &str, binary_extensions: &[String]) -> bool {
    let Some(ext) = path.rsplit('.').next().filter(|e| *e != path) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    binary_extensions.iter().any(|b| *b == ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;

    #[test]
    fn test_binary_extensions_filtered() {
        let config = SyncConfig::default();
        assert!(is_binary_path("assets/image.png", &config.binary_extensions));
        assert!(is_binary_path("media/video.mp4", &config.binary_extensions));
        assert!(is_binary_path("docs/doc.pdf", &config.binary_extensions));
        assert!(!is_binary_path("src/code.ts", &config.binary_extensions));
    }

    #[test]
    fn test_binary_check_case_insensitive() {
        let config = SyncConfig::default();
        assert!(is_binary_path("LOGO.PNG", &config.binary_extensions));
    }

    #[test]
    fn test_no_extension_is_not_binary() {
        let config = SyncConfig::default();
        assert!(!is_binary_path("Makefile", &config.binary_extensions));
        assert!(!is_binary_path("LICENSE", &config.binary_extensions));
    }
}
