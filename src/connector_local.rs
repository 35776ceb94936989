//! Local filesystem adapter.
//!
//! Walks the configured base path, applies include/exclude globs and the
//! file-extension allowlist, and hashes content with SHA-256 so local
//! files participate in the same SHA-keyed change detection as GitHub
//! blobs.

use anyhow::{bail, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

use crate::adapter::SourceAdapter;
use crate::config::LocalConnectorConfig;
use crate::models::{FetchedFile, RemoteFile};

pub struct LocalAdapter {
    config: LocalConnectorConfig,
}

impl LocalAdapter {
    pub fn new(config: LocalConnectorConfig) -> Result<Self> {
        if config.base_path.as_os_str().is_empty() {
            bail!("Local connector requires a non-empty base_path");
        }
        Ok(Self { config })
    }

    fn include_set(&self) -> Result<GlobSet> {
        let mut patterns = Vec::new();
        for include in &self.config.include_paths {
            for ext in &self.config.file_extensions {
                let prefix = include.trim_end_matches('/');
                if prefix == "." || prefix.is_empty() {
                    patterns.push(format!("**/*.{}", ext));
                } else {
                    patterns.push(format!("{}/**/*.{}", prefix, ext));
                }
            }
        }
        build_globset(&patterns)
    }

    fn exclude_set(&self) -> Result<GlobSet> {
        let mut patterns = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        for exclude in &self.config.exclude_paths {
            let trimmed = exclude.trim_matches('/');
            patterns.push(format!("**/{}/**", trimmed));
            patterns.push(format!("{}/**", trimmed));
        }
        build_globset(&patterns)
    }
}

#[async_trait]
impl SourceAdapter for LocalAdapter {
    fn source(&self) -> &str {
        "local"
    }

    fn repository(&self) -> &str {
        &self.config.repository
    }

    async fn list_files(&self) -> Result<Vec<RemoteFile>> {
        let root = &self.config.base_path;
        if !root.exists() {
            bail!("Local connector base path does not exist: {}", root.display());
        }

        let include_set = self.include_set()?;
        let exclude_set = self.exclude_set()?;

        let mut files = Vec::new();

        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().replace('\\', "/");

            if exclude_set.is_match(&rel_str) {
                continue;
            }
            if !include_set.is_match(&rel_str) {
                continue;
            }

            // Unreadable or non-UTF-8 files are skipped at listing time
            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %rel_str, error = %e, "Skipping unreadable file");
                    continue;
                }
            };

            files.push(RemoteFile {
                path: rel_str,
                sha: hash_content(&content),
            });
        }

        // Sort for deterministic ordering
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(files)
    }

    async fn fetch(&self, file: &RemoteFile) -> Result<FetchedFile> {
        let full_path = self.config.base_path.join(&file.path);
        let content = std::fs::read_to_string(&full_path)?;
        let metadata = file_metadata(&full_path);

        Ok(FetchedFile {
            path: file.path.clone(),
            sha: hash_content(&content),
            content,
            metadata_json: metadata.to_string(),
        })
    }
}

/// SHA-256 hex digest of file content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn file_metadata(path: &Path) -> serde_json::Value {
    let meta = std::fs::metadata(path).ok();
    let size = meta.as_ref().map(|m| m.len()).unwrap_or(0);
    let mtime = meta
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    serde_json::json!({
        "size": size,
        "mtime": mtime,
        "full_path": path.display().to_string(),
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config(base: PathBuf) -> LocalConnectorConfig {
        LocalConnectorConfig {
            base_path: base,
            repository: "workspace".to_string(),
            include_paths: vec![".".to_string()],
            exclude_paths: vec!["drafts".to_string()],
            file_extensions: vec!["md".to_string(), "txt".to_string()],
            dedupe_against_github: true,
        }
    }

    #[test]
    fn test_hash_content_stable() {
        assert_eq!(hash_content("abc"), hash_content("abc"));
        assert_ne!(hash_content("abc"), hash_content("abd"));
    }

    #[tokio::test]
    async fn test_list_applies_extension_allowlist_and_excludes() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.md"), "notes").unwrap();
        std::fs::write(tmp.path().join("data.csv"), "a,b").unwrap();
        std::fs::create_dir_all(tmp.path().join("drafts")).unwrap();
        std::fs::write(tmp.path().join("drafts/wip.md"), "wip").unwrap();

        let adapter = LocalAdapter::new(test_config(tmp.path().to_path_buf())).unwrap();
        let files = adapter.list_files().await.unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["notes.md"]);
    }

    #[tokio::test]
    async fn test_fetch_reads_content_and_metadata() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("readme.md"), "hello").unwrap();

        let adapter = LocalAdapter::new(test_config(tmp.path().to_path_buf())).unwrap();
        let files = adapter.list_files().await.unwrap();
        let fetched = adapter.fetch(&files[0]).await.unwrap();

        assert_eq!(fetched.content, "hello");
        assert_eq!(fetched.sha, hash_content("hello"));
        let meta: serde_json::Value = serde_json::from_str(&fetched.metadata_json).unwrap();
        assert_eq!(meta["size"], 5);
    }

    #[tokio::test]
    async fn test_missing_base_path_errors() {
        let adapter = LocalAdapter::new(test_config(PathBuf::from("/nonexistent/vault"))).unwrap();
        assert!(adapter.list_files().await.is_err());
    }
}
