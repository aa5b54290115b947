//! In-memory cache backend built on moka
//!
//! Bounded by entry count, TinyLFU eviction, per-entry TTL.

use crate::cache::config::{CacheConfig, DEFAULT_MAX_ENTRIES};
use crate::core::App;
use crate::error::{CacheError, Result};
use crate::traits::cache::Cache;
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry {
    value: Vec<u8>,
    /// Custom TTL for this entry, None means use default
    custom_ttl: Option<Duration>,
}

/// Expiry policy supporting per-entry TTL on top of an optional default
struct CacheExpiry {
    default_ttl: Option<Duration>,
}

impl Expiry<String, CacheEntry> for CacheExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.custom_ttl.or(self.default_ttl)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        _value: &CacheEntry,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        // TTL, not TTI
        duration_until_expiry
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.custom_ttl.or(self.default_ttl)
    }
}

/// In-memory cache backend
///
/// Backend for a slot configured as `{"backend": "memory"}`.
/// Clones share the same underlying storage; a key prefix scopes `clear`
/// to this cache's own keys.
///
/// # Example
///
/// ```rust,ignore
/// use cacheyard::cache::InMemoryCache;
/// use cacheyard::CacheExt;
///
/// let cache = InMemoryCache::builder()
///     .max_entries(1_000)
///     .key_prefix("tables_")
///     .build();
///
/// cache.set("public", &vec!["orders", "users"], None).await?;
/// ```
#[derive(Clone)]
pub struct InMemoryCache {
    inner: MokaCache<String, CacheEntry>,
    key_prefix: Option<String>,
    default_ttl: Option<Duration>,
    max_entries: u64,
}

impl InMemoryCache {
    /// Create a new in-memory cache with the specified maximum number of entries
    pub fn new(max_entries: u64) -> Self {
        Self::builder().max_entries(max_entries).build()
    }

    /// Create a cache with custom default TTL
    pub fn with_ttl(max_entries: u64, default_ttl: Duration) -> Self {
        Self::builder()
            .max_entries(max_entries)
            .time_to_live(default_ttl)
            .build()
    }

    /// Build a cache from a slot's backend parameters
    pub fn from_config(config: &CacheConfig) -> Self {
        let mut builder = Self::builder().max_entries(config.max_entries);
        builder.default_ttl = config.default_ttl();
        if let Some(prefix) = &config.key_prefix {
            builder = builder.key_prefix(prefix.clone());
        }
        builder.build()
    }

    pub fn builder() -> InMemoryCacheBuilder {
        InMemoryCacheBuilder::new()
    }

    /// Run pending maintenance tasks (eviction, expiration)
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Get the current number of entries in the cache
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    pub fn max_entries(&self) -> u64 {
        self.max_entries
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
}

/// Builder for InMemoryCache
pub struct InMemoryCacheBuilder {
    max_entries: u64,
    default_ttl: Option<Duration>,
    key_prefix: Option<String>,
}

impl InMemoryCacheBuilder {
    pub fn new() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: Some(Duration::from_secs(300)),
            key_prefix: None,
        }
    }

    /// Set maximum number of entries
    pub fn max_entries(mut self, max: u64) -> Self {
        self.max_entries = max;
        self
    }

    /// Set default time-to-live for entries
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Keep entries until evicted unless a per-entry TTL is given
    pub fn no_expiry(mut self) -> Self {
        self.default_ttl = None;
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn build(self) -> InMemoryCache {
        let expiry = CacheExpiry {
            default_ttl: self.default_ttl,
        };
        let inner = MokaCache::builder()
            .max_capacity(self.max_entries)
            .expire_after(expiry)
            .support_invalidation_closures()
            .build();

        InMemoryCache {
            inner,
            key_prefix: self.key_prefix,
            default_ttl: self.default_ttl,
            max_entries: self.max_entries,
        }
    }
}

impl Default for InMemoryCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .inner
            .get(&self.full_key(key))
            .await
            .map(|entry| entry.value))
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry {
            value,
            custom_ttl: ttl,
        };
        self.inner.insert(self.full_key(key), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.remove(&self.full_key(key)).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match &self.key_prefix {
            Some(prefix) => {
                let prefix = prefix.clone();
                self.inner
                    .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
                    .map_err(|e| CacheError::backend(format!("Cache clear failed: {}", e)))?;
            }
            None => self.inner.invalidate_all(),
        }
        self.inner.run_pending_tasks().await;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn init_app(&self, app: &App) -> Result<()> {
        tracing::debug!(
            host = %app.config().server.host,
            max_entries = self.max_entries,
            key_prefix = ?self.key_prefix,
            "In-memory cache attached"
        );
        Ok(())
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
