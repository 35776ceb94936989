//! # docvault CLI (`vault`)
//!
//! The `vault` binary drives the pipeline: database initialization,
//! repository sync, embedding indexing, cached search, and sync status.
//!
//! ## Usage
//!
//! ```bash
//! vault --config ./config/vault.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vault init` | Create the SQLite database and run schema migrations |
//! | `vault sync <source>` | Sync one source: `github:<owner>/<repo>[@branch]`, `github` (all configured), or `local` |
//! | `vault index` | Embed documents that have no vector yet |
//! | `vault search "<query>"` | Similarity search over indexed documents |
//! | `vault status` | Per-repository sync status |
//!
//! The process entry point owns component lifecycle: the store, provider,
//! and cache are constructed once here and passed by reference into each
//! component.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docvault::adapter::SourceAdapter;
use docvault::cache::CacheLayer;
use docvault::config::{load_config, Config, GithubRepoConfig};
use docvault::connector_github::GithubAdapter;
use docvault::connector_local::LocalAdapter;
use docvault::indexer::EmbeddingIndexer;
use docvault::models::SyncOutcome;
use docvault::search::{SearchOptions, SearchService};
use docvault::store::DocumentStore;
use docvault::{db, embedding, migrate, sync};

/// docvault: a semantically-indexed document mirror with cached search.
#[derive(Parser)]
#[command(
    name = "vault",
    about = "Mirror documents from GitHub and the local filesystem, embed them, and search by similarity",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, embeddings, sync_status). Idempotent.
    Init,

    /// Sync documents from a source.
    ///
    /// Source format: `github:<owner>/<repo>[@branch]`, `github` (every
    /// configured repository), or `local`.
    Sync {
        /// Source specifier.
        source: String,
    },

    /// Generate embeddings for documents that have none.
    Index,

    /// Similarity search over indexed documents.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<i64>,

        /// Minimum similarity in [0, 1].
        #[arg(long)]
        threshold: Option<f64>,

        /// Filter by source (`github` or `local`).
        #[arg(long)]
        source: Option<String>,

        /// Filter by repository (e.g. `acme/platform`).
        #[arg(long)]
        repository: Option<String>,
    },

    /// Show per-repository sync status.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docvault=info,vault=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => cmd_init(&config).await,
        Commands::Sync { source } => cmd_sync(&config, &source).await,
        Commands::Index => cmd_index(&config).await,
        Commands::Search {
            query,
            limit,
            threshold,
            source,
            repository,
        } => {
            let options = SearchOptions {
                limit,
                threshold,
                source,
                repository,
            };
            cmd_search(&config, &query, &options).await
        }
        Commands::Status => cmd_status(&config).await,
    }
}

async fn connect_store(config: &Config) -> Result<DocumentStore> {
    let pool = db::connect(&config.db.path).await?;
    Ok(DocumentStore::new(pool))
}

async fn cmd_init(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("initialized {}", config.db.path.display());
    Ok(())
}

async fn cmd_sync(config: &Config, source: &str) -> Result<()> {
    let store = connect_store(config).await?;
    let cache = CacheLayer::new(&config.cache);

    let mut outcomes: Vec<(String, SyncOutcome)> = Vec::new();

    if source == "local" {
        let local_config = config
            .connectors
            .local
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Local connector not configured"))?;
        let dedupe = local_config.dedupe_against_github;
        let adapter = LocalAdapter::new(local_config)?;
        let outcome = sync::sync_source(&store, &cache, &adapter, &config.sync, dedupe).await?;
        outcomes.push((adapter.repository().to_string(), outcome));
    } else if source == "github" || source.starts_with("github:") {
        let token = std::env::var("GITHUB_TOKEN")
            .with_context(|| "GITHUB_TOKEN environment variable not set")?;

        let repos: Vec<GithubRepoConfig> = if let Some(spec) = source.strip_prefix("github:") {
            vec![parse_github_spec(spec)?]
        } else {
            if config.connectors.github.is_empty() {
                bail!("No GitHub repositories configured");
            }
            config.connectors.github.clone()
        };

        for repo in &repos {
            let adapter = GithubAdapter::new(repo, token.clone())?;
            let repository = adapter.repository().to_string();
            let outcome = sync::sync_source(&store, &cache, &adapter, &config.sync, false).await?;
            outcomes.push((repository, outcome));
        }
    } else {
        bail!(
            "Unknown source: '{}'. Use github, github:<owner>/<repo>[@branch], or local",
            source
        );
    }

    for (repository, outcome) in &outcomes {
        println!("sync {}", repository);
        println!("  files found: {}", outcome.files_found);
        println!("  processed: {}", outcome.processed);
        println!("  skipped: {}", outcome.skipped);
        println!("  failed: {}", outcome.failed);
    }
    println!("ok");

    store.pool().close().await;
    Ok(())
}

/// Parse `owner/repo` or `owner/repo@branch`.
fn parse_github_spec(spec: &str) -> Result<GithubRepoConfig> {
    let (repo_part, branch) = match spec.split_once('@') {
        Some((r, b)) => (r, b.to_string()),
        None => (spec, "main".to_string()),
    };

    let Some((owner, repo)) = repo_part.split_once('/') else {
        bail!("Invalid GitHub spec '{}'. Expected owner/repo[@branch]", spec);
    };
    if owner.is_empty() || repo.is_empty() {
        bail!("Invalid GitHub spec '{}'. Expected owner/repo[@branch]", spec);
    }

    Ok(GithubRepoConfig {
        owner: owner.to_string(),
        repo: repo.to_string(),
        branch,
    })
}

async fn cmd_index(config: &Config) -> Result<()> {
    let store = connect_store(config).await?;
    let cache = CacheLayer::new(&config.cache);
    let provider = embedding::create_provider(&config.embedding)?;

    let indexer = EmbeddingIndexer::new(&store, provider.as_ref(), &cache, &config.embedding);
    let indexed = indexer.index_unindexed().await?;

    println!("index");
    println!("  embedded: {}", indexed);
    println!("ok");

    store.pool().close().await;
    Ok(())
}

async fn cmd_search(config: &Config, query: &str, options: &SearchOptions) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let store = connect_store(config).await?;
    let cache = CacheLayer::new(&config.cache);
    let provider = embedding::create_provider(&config.embedding)?;

    let service = SearchService::new(&store, provider.as_ref(), &cache, &config.search);
    let results = service.search(query, options).await?;

    if results.is_empty() {
        println!("No results.");
        store.pool().close().await;
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} {} / {}",
            i + 1,
            result.similarity,
            result.source,
            result.repository,
            result.path
        );
        let excerpt: String = result.content.chars().take(160).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!("    id: {}", result.id);
        println!();
    }

    store.pool().close().await;
    Ok(())
}

async fn cmd_status(config: &Config) -> Result<()> {
    let store = connect_store(config).await?;
    let records = store.list_sync_status().await?;

    if records.is_empty() {
        println!("No sync runs recorded.");
        store.pool().close().await;
        return Ok(());
    }

    for record in &records {
        let when = chrono::DateTime::from_timestamp(record.last_sync_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        print!(
            "{:8} {:30} {:12} {}",
            record.source, record.repository, record.status, when
        );
        if let Some(ref err) = record.error_message {
            print!("  ({})", err);
        }
        println!();
    }

    store.pool().close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_github_spec_with_branch() {
        let repo = parse_github_spec("acme/platform@develop").unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.repo, "platform");
        assert_eq!(repo.branch, "develop");
    }

    #[test]
    fn test_parse_github_spec_default_branch() {
        let repo = parse_github_spec("acme/platform").unwrap();
        assert_eq!(repo.branch, "main");
    }

    #[test]
    fn test_parse_github_spec_invalid() {
        assert!(parse_github_spec("justarepo").is_err());
        assert!(parse_github_spec("/repo").is_err());
        assert!(parse_github_spec("owner/").is_err());
    }
}
