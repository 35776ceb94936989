//! TTL key-value cache used to memoize search results.
//!
//! The cache is an optimization layer, never a source of truth. When
//! disabled, every operation is a safe no-op: `get` returns nothing, `set`
//! and `delete` do nothing, and no error ever surfaces. Callers behave
//! identically with or without a cache, only slower.
//!
//! Keys are grouped into namespaces by prefix (`search:{repository}:...`)
//! so bulk invalidation after a write is a single prefix deletion.
//! Staleness is bounded by that invalidation contract; the TTL is only a
//! backstop.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::CacheConfig;

struct CacheEntry {
    payload: String,
    expires_at: Instant,
}

/// In-process TTL cache. Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct CacheLayer {
    inner: Option<Arc<RwLock<HashMap<String, CacheEntry>>>>,
    default_ttl: Duration,
}

impl CacheLayer {
    pub fn new(config: &CacheConfig) -> Self {
        let inner = if config.enabled {
            Some(Arc::new(RwLock::new(HashMap::new())))
        } else {
            None
        };
        Self {
            inner,
            default_ttl: Duration::from_secs(config.default_ttl_secs),
        }
    }

    /// A cache with no backing store. All operations are no-ops.
    pub fn disabled() -> Self {
        Self {
            inner: None,
            default_ttl: Duration::from_secs(0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }

    /// Get a cached value, or `None` on miss, expiry, or disabled cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let inner = self.inner.as_ref()?;

        let mut map = inner.write().await;
        match map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                let payload = entry.payload.clone();
                drop(map);
                match serde_json::from_str(&payload) {
                    Ok(value) => {
                        tracing::debug!(key, "Cache hit");
                        Some(value)
                    }
                    Err(e) => {
                        tracing::warn!(key, error = %e, "Cache entry failed to deserialize");
                        None
                    }
                }
            }
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value with a TTL (the configured default when `None`).
    /// Serialization failures are logged and swallowed.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };

        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache set failed to serialize");
                return;
            }
        };

        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut map = inner.write().await;
        map.insert(
            key.to_string(),
            CacheEntry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );
        tracing::debug!(key, ttl_secs = ttl.as_secs(), "Cache set");
    }

    pub async fn delete(&self, key: &str) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        inner.write().await.remove(key);
    }

    /// Delete every key in a namespace.
    pub async fn delete_prefix(&self, prefix: &str) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        let mut map = inner.write().await;
        let before = map.len();
        map.retain(|key, _| !key.starts_with(prefix));
        let removed = before - map.len();
        if removed > 0 {
            tracing::debug!(prefix, removed, "Cache prefix deleted");
        }
    }

    /// Invalidate all cached search results for one repository.
    pub async fn invalidate_repository(&self, repository: &str) {
        self.delete_prefix(&repository_namespace(repository)).await;
        tracing::info!(repository, "Repository cache invalidated");
    }

    /// Invalidate every cached search result.
    pub async fn invalidate_search(&self) {
        self.delete_prefix("search:").await;
    }
}

/// The key prefix grouping all search entries for one repository.
pub fn repository_namespace(repository: &str) -> String {
    format!("search:{}:", repository)
}

/// Build the cache key for a search request.
///
/// Deterministic in (normalized query text, sorted filter pairs):
/// semantically identical requests collide, differing requests never do.
/// The repository filter sits in prefix position so per-repository
/// invalidation is a prefix deletion.
pub fn search_key(query: &str, filters: &[(&str, String)]) -> String {
    let normalized = normalize_query(query);

    let repository = filters
        .iter()
        .find(|(k, _)| *k == "repository")
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
        .unwrap_or("any");

    let mut pairs: Vec<(&str, &str)> = filters
        .iter()
        .map(|(k, v)| (*k, v.as_str()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let filter_str = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(":");

    format!("search:{}:{}:{}", repository, normalized, filter_str)
}

/// Collapse runs of whitespace and trim so cosmetic differences in the
/// query text do not fragment the cache.
fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn enabled_cache() -> CacheLayer {
        CacheLayer::new(&CacheConfig {
            enabled: true,
            default_ttl_secs: 300,
        })
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = enabled_cache();
        cache.set("k", &vec![1, 2, 3], None).await;
        let got: Option<Vec<i32>> = cache.get("k").await;
        assert_eq!(got, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = enabled_cache();
        cache.set("k", &"v", Some(Duration::from_millis(10))).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let got: Option<String> = cache.get("k").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn test_disabled_cache_is_noop() {
        let cache = CacheLayer::disabled();
        assert!(!cache.is_available());
        cache.set("k", &"v", None).await;
        let got: Option<String> = cache.get("k").await;
        assert_eq!(got, None);
        // delete on a disabled cache must not panic
        cache.delete("k").await;
        cache.delete_prefix("search:").await;
    }

    #[tokio::test]
    async fn test_delete_prefix_scopes_to_namespace() {
        let cache = enabled_cache();
        cache.set("search:acme/platform:q1:", &"a", None).await;
        cache.set("search:acme/platform:q2:", &"b", None).await;
        cache.set("search:other/repo:q1:", &"c", None).await;

        cache.invalidate_repository("acme/platform").await;

        let gone: Option<String> = cache.get("search:acme/platform:q1:").await;
        let kept: Option<String> = cache.get("search:other/repo:q1:").await;
        assert_eq!(gone, None);
        assert_eq!(kept, Some("c".to_string()));
    }

    #[test]
    fn test_search_key_deterministic_under_filter_order() {
        let a = search_key(
            "query text",
            &[
                ("limit", "10".to_string()),
                ("repository", "acme/platform".to_string()),
            ],
        );
        let b = search_key(
            "query text",
            &[
                ("repository", "acme/platform".to_string()),
                ("limit", "10".to_string()),
            ],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_search_key_normalizes_whitespace() {
        let a = search_key("  query   text ", &[]);
        let b = search_key("query text", &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_search_key_differs_for_different_requests() {
        let a = search_key("query", &[("limit", "10".to_string())]);
        let b = search_key("query", &[("limit", "20".to_string())]);
        assert_ne!(a, b);
        let c = search_key("other query", &[("limit", "10".to_string())]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_search_key_repository_in_prefix_position() {
        let key = search_key("q", &[("repository", "acme/platform".to_string())]);
        assert!(key.starts_with(&repository_namespace("acme/platform")));
    }
}
