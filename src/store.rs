//! Durable document store backed by SQLite.
//!
//! [`DocumentStore`] owns every write path in the system: hash-stable
//! document upserts keyed by `(source, repository, path)`, batched
//! embedding upserts keyed by document id, sync-status records, and the
//! similarity match used by search. Conflict resolution by natural key is
//! the only concurrency control; two concurrent syncs for different
//! sources never share mutable state beyond this store.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{
    Document, FetchedFile, SearchMatch, SyncState, SyncStatusRecord, UnindexedDocument,
};

#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upsert one document by `(source, repository, path)`.
    ///
    /// The conflict update only fires when the incoming `sha` differs from
    /// the stored one, so re-ingesting unchanged content is a no-op and
    /// `updated_at` does not advance.
    pub async fn upsert_document(
        &self,
        source: &str,
        repository: &str,
        file: &FetchedFile,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO documents (id, source, repository, path, content, sha, metadata_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source, repository, path) DO UPDATE SET
                content = excluded.content,
                sha = excluded.sha,
                metadata_json = excluded.metadata_json,
                updated_at = excluded.updated_at
            WHERE excluded.sha <> documents.sha
            "#,
        )
        .bind(&id)
        .bind(source)
        .bind(repository)
        .bind(&file.path)
        .bind(&file.content)
        .bind(&file.sha)
        .bind(&file.metadata_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a document by its natural key.
    pub async fn get_document(
        &self,
        source: &str,
        repository: &str,
        path: &str,
    ) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT id, source, repository, path, content, sha, metadata_json, created_at, updated_at
            FROM documents
            WHERE source = ? AND repository = ? AND path = ?
            "#,
        )
        .bind(source)
        .bind(repository)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Document {
            id: r.get("id"),
            source: r.get("source"),
            repository: r.get("repository"),
            path: r.get("path"),
            content: r.get("content"),
            sha: r.get("sha"),
            metadata_json: r.get("metadata_json"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn document_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Whether any document from `source` carries this content hash.
    /// Used by the local connector's dedupe-against-GitHub policy.
    pub async fn sha_exists_for_source(&self, source: &str, sha: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE source = ? AND sha = ?")
                .bind(source)
                .bind(sha)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// Documents that have no embedding yet, oldest first, bounded by `limit`.
    pub async fn find_unindexed(&self, limit: usize) -> Result<Vec<UnindexedDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.content
            FROM documents d
            LEFT JOIN embeddings e ON e.document_id = d.id
            WHERE e.document_id IS NULL
            ORDER BY d.created_at, d.id
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| UnindexedDocument {
                id: r.get("id"),
                content: r.get("content"),
            })
            .collect())
    }

    /// Upsert one embedding keyed by document id.
    pub async fn upsert_embedding(
        &self,
        document_id: &str,
        vector: &[f32],
        model: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO embeddings (document_id, embedding, model, dims, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                embedding = excluded.embedding,
                model = excluded.model,
                dims = excluded.dims,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(document_id)
        .bind(vec_to_blob(vector))
        .bind(model)
        .bind(vector.len() as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert a sub-batch of embeddings in a single transaction.
    ///
    /// Either the whole sub-batch commits or none of it does; the indexer
    /// treats a failure here as fatal to the sub-batch only.
    pub async fn upsert_embeddings(
        &self,
        batch: &[(String, Vec<f32>)],
        model: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (document_id, vector) in batch {
            sqlx::query(
                r#"
                INSERT INTO embeddings (document_id, embedding, model, dims, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(document_id) DO UPDATE SET
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(document_id)
            .bind(vec_to_blob(vector))
            .bind(model)
            .bind(vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn embedding_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Record the sync status for `(source, repository)`.
    pub async fn set_sync_status(
        &self,
        source: &str,
        repository: &str,
        state: SyncState,
        error_message: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO sync_status (source, repository, status, last_sync_at, error_message, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(source, repository) DO UPDATE SET
                status = excluded.status,
                last_sync_at = excluded.last_sync_at,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(source)
        .bind(repository)
        .bind(state.as_str())
        .bind(now)
        .bind(error_message)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_sync_status(
        &self,
        source: &str,
        repository: &str,
    ) -> Result<Option<SyncStatusRecord>> {
        let row = sqlx::query(
            r#"
            SELECT source, repository, status, last_sync_at, error_message
            FROM sync_status
            WHERE source = ? AND repository = ?
            "#,
        )
        .bind(source)
        .bind(repository)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SyncStatusRecord {
            source: r.get("source"),
            repository: r.get("repository"),
            status: r.get("status"),
            last_sync_at: r.get("last_sync_at"),
            error_message: r.get("error_message"),
        }))
    }

    pub async fn list_sync_status(&self) -> Result<Vec<SyncStatusRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT source, repository, status, last_sync_at, error_message
            FROM sync_status
            ORDER BY source, repository
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| SyncStatusRecord {
                source: r.get("source"),
                repository: r.get("repository"),
                status: r.get("status"),
                last_sync_at: r.get("last_sync_at"),
                error_message: r.get("error_message"),
            })
            .collect())
    }

    /// Rank documents by similarity to `query_vec`.
    ///
    /// Returns rows with similarity >= `threshold`, sorted descending,
    /// bounded by `limit`, optionally filtered by source and repository.
    /// Cosine values below zero never pass a threshold in `[0, 1]`, so
    /// reported similarities lie in `[0, 1]`.
    pub async fn match_documents(
        &self,
        query_vec: &[f32],
        threshold: f64,
        limit: i64,
        source: Option<&str>,
        repository: Option<&str>,
    ) -> Result<Vec<SearchMatch>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.source, d.repository, d.path, d.content, d.metadata_json, d.sha,
                   e.embedding
            FROM embeddings e
            JOIN documents d ON d.id = e.document_id
            WHERE (?1 IS NULL OR d.source = ?1)
              AND (?2 IS NULL OR d.repository = ?2)
            "#,
        )
        .bind(source)
        .bind(repository)
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<SearchMatch> = rows
            .iter()
            .filter_map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let similarity = cosine_similarity(query_vec, &vec) as f64;
                if similarity < threshold {
                    return None;
                }

                let metadata_json: String = row.get("metadata_json");
                let metadata =
                    serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null);

                Some(SearchMatch {
                    id: row.get("id"),
                    source: row.get("source"),
                    repository: row.get("repository"),
                    path: row.get("path"),
                    content: row.get("content"),
                    metadata,
                    sha: row.get("sha"),
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(limit.max(0) as usize);

        Ok(matches)
    }
}
