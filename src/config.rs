use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Files fetched and upserted per unit of work.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extensions that are always skipped during ingestion.
    #[serde(default = "default_binary_extensions")]
    pub binary_extensions: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            binary_extensions: default_binary_extensions(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}

fn default_binary_extensions() -> Vec<String> {
    [
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "mp3", "mp4", "avi", "mov",
        "wav", "flac", "zip", "tar", "gz", "bz2", "7z", "rar", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "exe", "dll", "so", "dylib", "bin", "woff", "woff2", "ttf", "eot",
        "otf", "lock", "lockb",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Max characters sent to the embedding provider. Longer documents are
    /// embedded on a prefix only.
    #[serde(default = "default_truncation_limit")]
    pub truncation_limit: usize,
    /// Documents embedded per parallel sub-batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Ceiling on documents considered per `index_unindexed` pass.
    #[serde(default = "default_max_unindexed_per_run")]
    pub max_unindexed_per_run: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            truncation_limit: default_truncation_limit(),
            batch_size: default_batch_size(),
            max_unindexed_per_run: default_max_unindexed_per_run(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_truncation_limit() -> usize {
    8000
}
fn default_max_unindexed_per_run() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// TTL in seconds for search-result entries.
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            default_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}
fn default_cache_ttl() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub default_limit: i64,
    #[serde(default = "default_search_threshold")]
    pub default_threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            default_threshold: default_search_threshold(),
        }
    }
}

fn default_search_limit() -> i64 {
    10
}
fn default_search_threshold() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConnectorsConfig {
    #[serde(default)]
    pub github: Vec<GithubRepoConfig>,
    pub local: Option<LocalConnectorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubRepoConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalConnectorConfig {
    pub base_path: PathBuf,
    /// Repository label applied to documents from this connector.
    #[serde(default = "default_local_repository")]
    pub repository: String,
    #[serde(default = "default_include_paths")]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,
    /// Skip local files whose hash matches an existing GitHub document.
    /// Policy switch, not a correctness requirement.
    #[serde(default = "default_dedupe")]
    pub dedupe_against_github: bool,
}

fn default_local_repository() -> String {
    "workspace".to_string()
}

fn default_include_paths() -> Vec<String> {
    vec![".".to_string()]
}

fn default_file_extensions() -> Vec<String> {
    vec![
        "md".to_string(),
        "txt".to_string(),
        "rs".to_string(),
        "ts".to_string(),
        "js".to_string(),
        "toml".to_string(),
        "yaml".to_string(),
        "yml".to_string(),
        "json".to_string(),
    ]
}

fn default_dedupe() -> bool {
    true
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate sync
    if config.sync.batch_size == 0 {
        anyhow::bail!("sync.batch_size must be > 0");
    }

    // Validate embedding
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.truncation_limit == 0 {
        anyhow::bail!("embedding.truncation_limit must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Only 'openai' is supported.",
            other
        ),
    }

    // Validate search defaults
    if config.search.default_limit < 1 {
        anyhow::bail!("search.default_limit must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.search.default_threshold) {
        anyhow::bail!("search.default_threshold must be in [0.0, 1.0]");
    }

    Ok(config)
}
