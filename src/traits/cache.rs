//! Cache trait for key-value storage
//!
//! Every client a registry slot can hold implements this trait, whether it
//! was built from backend parameters or returned by a user factory.

use crate::core::App;
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use std::time::Duration;

/// Cache trait for key-value storage with optional TTL
///
/// Note: This trait uses type-erased serialization to be object-safe.
/// Use the helper methods on [`CacheExt`] for typed access.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a value from the cache as JSON bytes
    ///
    /// Returns `Ok(None)` if the key doesn't exist or has expired.
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value in the cache with optional TTL
    ///
    /// If `ttl` is `None`, the backend's default TTL applies.
    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Delete a value from the cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Clear all values owned by this cache
    async fn clear(&self) -> Result<()>;

    /// Last known health of the backend, without touching the network
    fn is_healthy(&self) -> bool;

    /// Probe the backend, as the `/health` endpoint does
    ///
    /// Defaults to [`is_healthy`](Self::is_healthy). Networked backends
    /// override this with a round trip bounded by a timeout.
    async fn check_health(&self) -> bool {
        self.is_healthy()
    }

    /// Downcast support, e.g. to inspect a concrete backend's settings
    fn as_any(&self) -> &dyn Any;

    /// Short backend identifier used in logs and health output
    fn backend_name(&self) -> &'static str {
        "custom"
    }

    /// Deferred setup, run once the host application has been constructed
    ///
    /// Called by [`CacheManager::init_app`](crate::cache::CacheManager::init_app).
    /// Backends that need a live connection open it here.
    async fn init_app(&self, _app: &App) -> Result<()> {
        Ok(())
    }
}

/// Helper trait for type-safe cache operations
///
/// Implemented for every `Cache`, including `dyn Cache`, so registry handles
/// can be used directly: `caches.cache().get::<User>("user:1").await`.
pub trait CacheExt: Cache {
    /// Get a value from the cache
    async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        if let Some(bytes) = self.get_bytes(key).await? {
            serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CacheError::serialization(format!("Failed to deserialize: {}", e)))
        } else {
            Ok(None)
        }
    }

    /// Set a value in the cache
    async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
    where
        T: serde::Serialize + Send + Sync,
    {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| CacheError::serialization(format!("Failed to serialize: {}", e)))?;
        self.set_bytes(key, bytes, ttl).await
    }

    /// Get a value, computing and storing it on a miss
    async fn get_or_set<T, F, Fut>(&self, key: &str, ttl: Option<Duration>, compute: F) -> Result<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = compute().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }

    /// Get a value as a string (convenience method)
    async fn get_str(&self, key: &str) -> Result<Option<String>> {
        self.get(key).await
    }

    /// Set a string value (convenience method)
    async fn set_str(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.set(key, &value.to_string(), ttl).await
    }
}

// Blanket implementation - all Cache implementations get CacheExt for free
impl<T: Cache + ?Sized> CacheExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TableNames {
        schema: String,
        tables: Vec<String>,
    }

    #[tokio::test]
    async fn test_typed_roundtrip_through_trait_object() {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new(100));
        let names = TableNames {
            schema: "public".to_string(),
            tables: vec!["orders".to_string(), "users".to_string()],
        };

        cache.set("tables:public", &names, None).await.unwrap();
        let loaded: Option<TableNames> = cache.get("tables:public").await.unwrap();
        assert_eq!(loaded, Some(names));
    }

    #[tokio::test]
    async fn test_get_with_wrong_type_is_serialization_error() {
        let cache = InMemoryCache::new(100);
        cache.set_str("key", "not a number", None).await.unwrap();

        let err = cache.get::<u64>("key").await.unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_get_or_set_computes_once() {
        let cache = InMemoryCache::new(100);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: u32 = cache
                .get_or_set("answer", None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_set_does_not_store_errors() {
        let cache = InMemoryCache::new(100);

        let result: Result<u32> = cache
            .get_or_set("flaky", None, || async { Err(CacheError::backend("upstream down")) })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.get::<u32>("flaky").await.unwrap(), None);
    }
}
