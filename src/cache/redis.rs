use crate::cache::config::CacheConfig;
use crate::core::App;
use crate::error::{CacheError, Result};
use crate::traits::cache::Cache;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

const SCAN_BATCH: usize = 500;
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis cache backend
///
/// Creating the client does not touch the network. The multiplexed
/// connection is opened by `init_app` and reused afterwards; operations
/// issued before init open a connection on demand.
///
/// `is_healthy` reports the outcome of the last `PING` sent by
/// `check_health` (or of `init_app`); it never blocks.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    connection: Arc<OnceCell<MultiplexedConnection>>,
    healthy: Arc<AtomicBool>,
    default_ttl: Option<Duration>,
    key_prefix: Option<String>,
}

impl RedisCache {
    /// Create a new Redis cache from a connection URL
    pub fn new(url: &str, default_ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::configuration(format!("Invalid Redis URL: {}", e)))?;

        Ok(Self {
            client,
            connection: Arc::new(OnceCell::new()),
            healthy: Arc::new(AtomicBool::new(false)),
            default_ttl: Some(default_ttl),
            key_prefix: None,
        })
    }

    /// Build a cache from a slot's backend parameters
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let url = config.redis_url.as_deref().ok_or_else(|| {
            CacheError::configuration("redis backend requires `redis_url` (or CACHE_REDIS_URL)")
        })?;

        let mut cache = Self::new(url, Duration::ZERO)?;
        cache.default_ttl = config.default_ttl();
        cache.key_prefix = config.key_prefix.clone();
        Ok(cache)
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    pub fn key_prefix(&self) -> Option<&str> {
        self.key_prefix.as_deref()
    }

    fn full_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }

    async fn open_connection(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::backend(format!("Failed to get Redis connection: {}", e)))
    }

    /// Get the shared connection, opening it on first use
    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        let conn = self
            .connection
            .get_or_try_init(|| self.open_connection())
            .await?;
        Ok(conn.clone())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| CacheError::backend(format!("Redis PING failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.get_connection().await?;

        redis::cmd("GET")
            .arg(self.full_key(key))
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(|e| CacheError::backend(format!("Redis GET failed: {}", e)))
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let key = self.full_key(key);

        // SETEX rejects 0, so sub-second TTLs round up to one second
        let ttl_seconds = ttl.or(self.default_ttl).map(|d| d.as_secs().max(1));

        if let Some(ttl_secs) = ttl_seconds {
            redis::cmd("SETEX")
                .arg(key)
                .arg(ttl_secs)
                .arg(value)
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| CacheError::backend(format!("Redis SETEX failed: {}", e)))?;
        } else {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| CacheError::backend(format!("Redis SET failed: {}", e)))?;
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;

        redis::cmd("DEL")
            .arg(self.full_key(key))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::backend(format!("Redis DEL failed: {}", e)))?;

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;

        let Some(prefix) = &self.key_prefix else {
            redis::cmd("FLUSHDB")
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| CacheError::backend(format!("Redis FLUSHDB failed: {}", e)))?;
            return Ok(());
        };

        // Prefixed caches share a database with other slots, only drop our keys
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::backend(format!("Redis SCAN failed: {}", e)))?;

            if !keys.is_empty() {
                redis::cmd("DEL")
                    .arg(keys)
                    .query_async::<()>(&mut conn)
                    .await
                    .map_err(|e| CacheError::backend(format!("Redis DEL failed: {}", e)))?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    async fn check_health(&self) -> bool {
        let healthy = match tokio::time::timeout(HEALTH_TIMEOUT, self.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Redis health check failed");
                false
            }
            Err(_) => {
                tracing::warn!(timeout = ?HEALTH_TIMEOUT, "Redis health check timed out");
                false
            }
        };
        self.healthy.store(healthy, Ordering::Relaxed);
        healthy
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn init_app(&self, _app: &App) -> Result<()> {
        self.get_connection().await?;
        self.healthy.store(true, Ordering::Relaxed);
        tracing::info!(key_prefix = ?self.key_prefix, "Redis cache connected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheBackend;
    use crate::traits::cache::CacheExt;

    #[test]
    fn test_from_config_requires_url() {
        let config = CacheConfig::new(CacheBackend::Redis);
        let err = RedisCache::from_config(&config).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_from_config_does_not_connect() {
        // Nothing listens on this port; construction must still succeed
        let config = CacheConfig::new(CacheBackend::Redis)
            .with_redis_url("redis://127.0.0.1:1/")
            .with_default_ttl_seconds(86400)
            .with_key_prefix("app_");
        let cache = RedisCache::from_config(&config).unwrap();

        assert_eq!(cache.default_ttl(), Some(Duration::from_secs(86400)));
        assert_eq!(cache.key_prefix(), Some("app_"));
        assert_eq!(cache.full_key("k"), "app_k");
    }

    #[tokio::test]
    async fn test_health_check_fails_without_server() {
        let config = CacheConfig::new(CacheBackend::Redis).with_redis_url("redis://127.0.0.1:1/");
        let cache = RedisCache::from_config(&config).unwrap();
        assert!(!cache.is_healthy());

        assert!(!cache.check_health().await);
        assert!(!cache.is_healthy());
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_cache() {
        let config = CacheConfig::new(CacheBackend::Redis)
            .with_redis_url("redis://127.0.0.1/")
            .with_key_prefix("cacheyard_test_");
        let cache = RedisCache::from_config(&config).unwrap();
        assert!(cache.check_health().await);
        assert!(cache.is_healthy());

        cache.set("test_key", &"test_value", None).await.unwrap();
        let value: Option<String> = cache.get("test_key").await.unwrap();
        assert_eq!(value, Some("test_value".to_string()));

        cache.clear().await.unwrap();
        let value: Option<String> = cache.get("test_key").await.unwrap();
        assert_eq!(value, None);
    }
}
