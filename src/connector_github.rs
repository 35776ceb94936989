//! GitHub tree adapter.
//!
//! Resolves a branch ref to a commit, lists the full repository tree
//! recursively, classifies entries (blobs only), and fetches blob content
//! by SHA. All responses are deserialized into typed structs at the
//! boundary; internal logic never touches raw JSON shapes.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use crate::adapter::SourceAdapter;
use crate::config::GithubRepoConfig;
use crate::models::{FetchedFile, RemoteFile};

const GITHUB_API: &str = "https://api.github.com";

pub struct GithubAdapter {
    client: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    branch: String,
    repository: String,
}

impl GithubAdapter {
    pub fn new(config: &GithubRepoConfig, token: String) -> Result<Self> {
        if config.owner.is_empty() || config.repo.is_empty() {
            bail!("GitHub connector requires a non-empty owner and repo");
        }

        let client = reqwest::Client::builder()
            .user_agent("docvault")
            .build()?;

        Ok(Self {
            client,
            token,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            repository: format!("{}/{}", config.owner, config.repo),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("GitHub request failed: {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("GitHub API error {} for {}: {}", status, url, body);
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("Invalid GitHub response from {}", url))
    }

    /// Resolve the branch ref to its commit SHA.
    async fn resolve_branch(&self) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/git/ref/heads/{}",
            GITHUB_API, self.owner, self.repo, self.branch
        );
        let reference: GitRef = self.get_json(&url).await?;
        Ok(reference.object.sha)
    }
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitRefObject,
}

#[derive(Debug, Deserialize)]
struct GitRefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitTree {
    tree: Vec<GitTreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct GitTreeEntry {
    path: Option<String>,
    sha: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitBlob {
    content: String,
    encoding: String,
    #[serde(default)]
    size: u64,
}

#[async_trait]
impl SourceAdapter for GithubAdapter {
    fn source(&self) -> &str {
        "github"
    }

    fn repository(&self) -> &str {
        &self.repository
    }

    async fn list_files(&self) -> Result<Vec<RemoteFile>> {
        let commit_sha = self.resolve_branch().await?;

        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=true",
            GITHUB_API, self.owner, self.repo, commit_sha
        );
        let tree: GitTree = self.get_json(&url).await?;

        if tree.truncated {
            tracing::warn!(
                repository = %self.repository,
                "GitHub tree listing truncated; some files will be missed"
            );
        }

        // Blobs only; trees and submodule commits have no content to fetch
        let files = tree
            .tree
            .into_iter()
            .filter(|e| e.entry_type.as_deref() == Some("blob"))
            .filter_map(|e| match (e.path, e.sha) {
                (Some(path), Some(sha)) => Some(RemoteFile { path, sha }),
                _ => None,
            })
            .collect();

        Ok(files)
    }

    async fn fetch(&self, file: &RemoteFile) -> Result<FetchedFile> {
        let url = format!(
            "{}/repos/{}/{}/git/blobs/{}",
            GITHUB_API, self.owner, self.repo, file.sha
        );
        let blob: GitBlob = self.get_json(&url).await?;

        if blob.encoding != "base64" {
            bail!(
                "Unexpected blob encoding '{}' for {}",
                blob.encoding,
                file.path
            );
        }

        let content = decode_blob_content(&blob.content)
            .with_context(|| format!("Failed to decode blob for {}", file.path))?;

        let metadata = serde_json::json!({
            "size": blob.size,
            "encoding": blob.encoding,
        });

        Ok(FetchedFile {
            path: file.path.clone(),
            sha: file.sha.clone(),
            content,
            metadata_json: metadata.to_string(),
        })
    }
}

/// Decode GitHub's base64 blob payload, which is wrapped with newlines.
fn decode_blob_content(raw: &str) -> Result<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD.decode(cleaned.as_bytes())?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}
