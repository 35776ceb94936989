//! The adapter seam between content sources and the sync orchestrator.
//!
//! Implement [`SourceAdapter`] to feed documents from a new source through
//! the standard sync pipeline (listing → binary filter → batched fetch →
//! hash-stable upsert). Built-in adapters:
//! [`crate::connector_github::GithubAdapter`] and
//! [`crate::connector_local::LocalAdapter`].

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{FetchedFile, RemoteFile};

/// A content source that produces candidate documents for one repository.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source label stored on documents (e.g. `"github"`, `"local"`).
    fn source(&self) -> &str;

    /// Repository label stored on documents (e.g. `"acme/platform"`).
    fn repository(&self) -> &str;

    /// List every current file in the source with its content hash.
    ///
    /// A failure here is fatal to the sync run: the orchestrator records
    /// an error status and propagates it.
    async fn list_files(&self) -> Result<Vec<RemoteFile>>;

    /// Fetch the content for one listed file.
    ///
    /// A failure here is non-fatal: the orchestrator logs it, skips the
    /// file, and continues the batch.
    async fn fetch(&self, file: &RemoteFile) -> Result<FetchedFile>;
}
