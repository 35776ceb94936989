//! Core data models used throughout docvault.
//!
//! These types represent the files, documents, and search results that flow
//! through the sync, indexing, and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// A file reference produced by an adapter's listing pass, before content
/// is fetched. `sha` is the content hash the adapter knows for the file
/// (the git blob SHA for GitHub, a SHA-256 digest for local files).
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub path: String,
    pub sha: String,
}

/// A file with its content fetched, ready to be upserted as a document.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub path: String,
    pub sha: String,
    pub content: String,
    pub metadata_json: String,
}

/// A document row as stored in SQLite.
///
/// Identity is `(source, repository, path)`, enforced by a unique
/// constraint. At most one live row exists per identity; writes go through
/// the hash-stable upsert in [`crate::store::DocumentStore`].
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub repository: String,
    pub path: String,
    pub content: String,
    pub sha: String,
    pub metadata_json: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A document that has no embedding yet, as returned by
/// [`crate::store::DocumentStore::find_unindexed`].
#[derive(Debug, Clone)]
pub struct UnindexedDocument {
    pub id: String,
    pub content: String,
}

/// Sync lifecycle states for one `(source, repository)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Pending,
    InProgress,
    Success,
    Error,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Pending => "pending",
            SyncState::InProgress => "in_progress",
            SyncState::Success => "success",
            SyncState::Error => "error",
        }
    }
}

/// A sync-status row: one per `(source, repository)`, written by the sync
/// orchestrator at the start and end of every run.
#[derive(Debug, Clone)]
pub struct SyncStatusRecord {
    pub source: String,
    pub repository: String,
    pub status: String,
    pub last_sync_at: i64,
    pub error_message: Option<String>,
}

/// Aggregate result of one sync run over a single source identity.
///
/// A partially failed run still reports concrete counts so operators can
/// see how much of a repository was captured.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub files_found: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<SyncFileError>,
}

/// A per-file error recorded during a sync run. Non-fatal: the run
/// continues past it.
#[derive(Debug, Clone)]
pub struct SyncFileError {
    pub path: String,
    pub error: String,
}

/// One ranked row from a similarity search.
///
/// Rows arrive pre-sorted descending by `similarity`; the search service
/// passes them through without re-sorting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchMatch {
    pub id: String,
    pub source: String,
    pub repository: String,
    pub path: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub sha: String,
    pub similarity: f64,
}
