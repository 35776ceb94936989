//! Embedding provider abstraction and the OpenAI implementation.
//!
//! The provider turns text into fixed-dimension vectors. Failures are
//! surfaced as a typed [`EmbeddingError`] (auth, rate limit, timeout, API)
//! and are never retried here; retry policy belongs to callers, and the
//! indexer deliberately treats a failed sub-batch as skippable instead.
//!
//! Also provides vector utilities for SQLite storage:
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian f32 BLOB codec
//! - [`cosine_similarity`]: similarity between two embedding vectors
//! - [`truncate_for_embedding`]: apply the character budget before a
//!   provider call

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::EmbeddingConfig;

/// Errors surfaced by an embedding provider.
///
/// The variants mirror the failure classes the pipeline distinguishes:
/// authentication and rate-limit errors come back from the API with
/// specific statuses, timeouts from the HTTP client, and everything else
/// is an opaque API failure.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider authentication failed: {0}")]
    Auth(String),
    #[error("embedding provider rate limited: {0}")]
    RateLimited(String),
    #[error("embedding request timed out")]
    Timeout,
    #[error("embedding provider error: {0}")]
    Api(String),
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// An external service that turns text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the vector dimensionality (e.g. `1536`). Must match the
    /// stored schema.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text (e.g. a search query).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "empty embedding response".to_string(),
            ));
        }
        Ok(vectors.remove(0))
    }
}

/// Truncate `content` to the provider character budget.
///
/// Documents longer than the budget are embedded on a prefix only. The
/// cut respects UTF-8 boundaries by counting characters, not bytes.
pub fn truncate_for_embedding(content: &str, limit: usize) -> &str {
    match content.char_indices().nth(limit) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    }
}

// ============ OpenAI Provider ============

/// Embedding provider backed by the OpenAI embeddings API.
///
/// Calls `POST /v1/embeddings` with the configured model and dimensions.
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "dimensions": self.dims,
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else {
                    EmbeddingError::Api(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => EmbeddingError::Auth(text),
                429 => EmbeddingError::RateLimited(text),
                _ => EmbeddingError::Api(format!("{}: {}", status, text)),
            });
        }

        let parsed: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        // The API returns entries with an index field; order by it so the
        // output matches the input order.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        for d in &data {
            if d.embedding.len() != self.dims {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} dims, got {}",
                    self.dims,
                    d.embedding.len()
                )));
            }
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Create a provider from configuration.
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_truncate_under_limit() {
        let content = "a".repeat(8000);
        assert_eq!(truncate_for_embedding(&content, 8000).len(), 8000);
    }

    #[test]
    fn test_truncate_over_limit() {
        let content = "a".repeat(15000);
        let truncated = truncate_for_embedding(&content, 8000);
        assert_eq!(truncated.len(), 8000);
        assert_eq!(truncated, &content[..8000]);
    }

    #[test]
    fn test_truncate_multibyte_boundary() {
        // 'é' is two bytes; the cut must count characters, not bytes
        let content = "é".repeat(10);
        let truncated = truncate_for_embedding(&content, 4);
        assert_eq!(truncated.chars().count(), 4);
    }
}
