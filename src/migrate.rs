use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent, safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Documents: one live row per (source, repository, path)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            repository TEXT NOT NULL,
            path TEXT NOT NULL,
            content TEXT NOT NULL,
            sha TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(source, repository, path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embeddings: one per document, cascade with it
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            document_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Sync status: one per (source, repository)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_status (
            source TEXT NOT NULL,
            repository TEXT NOT NULL,
            status TEXT NOT NULL,
            last_sync_at INTEGER NOT NULL,
            error_message TEXT,
            updated_at INTEGER NOT NULL,
            UNIQUE(source, repository)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_repository ON documents(source, repository)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_sha ON documents(sha)")
        .execute(pool)
        .await?;

    Ok(())
}
