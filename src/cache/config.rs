use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Cache backend type
///
/// Accepts the short names (`memory`, `redis`, `null`) as well as the
/// Flask-Caching style `CACHE_TYPE` values (`SimpleCache`, `RedisCache`,
/// `NullCache`) so existing configuration documents load unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CacheBackend {
    /// In-memory cache
    #[serde(
        rename = "memory",
        alias = "inmemory",
        alias = "in_memory",
        alias = "simple",
        alias = "SimpleCache"
    )]
    InMemory,
    /// Redis cache (requires cache-redis feature)
    #[serde(rename = "redis", alias = "RedisCache")]
    Redis,
    /// No-op cache, caching disabled (default)
    #[serde(rename = "null", alias = "noop", alias = "NullCache")]
    NoOp,
}

/// A mapping that names no backend disables caching, as Flask-Caching does
impl Default for CacheBackend {
    fn default() -> Self {
        Self::NoOp
    }
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::InMemory => "memory",
            CacheBackend::Redis => "redis",
            CacheBackend::NoOp => "null",
        }
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend parameters for one cache slot
///
/// This is the mapping form of a slot's configuration. Keys the backend
/// does not know about are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Cache backend type
    #[serde(default, alias = "CACHE_TYPE")]
    pub backend: CacheBackend,

    /// Redis connection URL (only used for Redis backend)
    #[serde(default, alias = "CACHE_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Default TTL for cached values (in seconds), 0 means no expiry
    #[serde(default = "default_ttl_seconds", alias = "CACHE_DEFAULT_TIMEOUT")]
    pub default_ttl_seconds: u64,

    /// Prefix prepended to every key this cache stores
    #[serde(default, alias = "CACHE_KEY_PREFIX")]
    pub key_prefix: Option<String>,

    /// Maximum number of entries for in-memory cache, 500 like `SimpleCache`
    #[serde(default = "default_max_entries", alias = "CACHE_THRESHOLD")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: None,
            default_ttl_seconds: default_ttl_seconds(),
            key_prefix: None,
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    /// Parameters for a given backend, everything else defaulted
    pub fn new(backend: CacheBackend) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Parameters for a disabled slot
    pub fn disabled() -> Self {
        Self::new(CacheBackend::NoOp)
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    pub fn with_default_ttl_seconds(mut self, seconds: u64) -> Self {
        self.default_ttl_seconds = seconds;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Default TTL as a `Duration`, `None` when entries never expire
    pub fn default_ttl(&self) -> Option<Duration> {
        match self.default_ttl_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }
}

fn default_ttl_seconds() -> u64 {
    300 // 5 minutes
}

/// Entry bound when none is configured
pub(crate) const DEFAULT_MAX_ENTRIES: u64 = 500;

fn default_max_entries() -> u64 {
    DEFAULT_MAX_ENTRIES
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_backend_names() {
        let config: CacheConfig = serde_json::from_value(json!({"backend": "memory"})).unwrap();
        assert_eq!(config.backend, CacheBackend::InMemory);
        assert_eq!(config.default_ttl_seconds, 300);
        assert_eq!(config.max_entries, 500);
        assert_eq!(config.key_prefix, None);

        let config: CacheConfig = serde_json::from_value(json!({"backend": "null"})).unwrap();
        assert_eq!(config.backend, CacheBackend::NoOp);

        let config: CacheConfig = serde_json::from_value(json!({"backend": "redis"})).unwrap();
        assert_eq!(config.backend, CacheBackend::Redis);
    }

    #[test]
    fn test_flask_caching_keys() {
        let config: CacheConfig = serde_json::from_value(json!({
            "CACHE_TYPE": "RedisCache",
            "CACHE_DEFAULT_TIMEOUT": 86400,
            "CACHE_KEY_PREFIX": "thumbnails_",
            "CACHE_REDIS_URL": "redis://localhost:6379/0"
        }))
        .unwrap();

        assert_eq!(config.backend, CacheBackend::Redis);
        assert_eq!(config.default_ttl_seconds, 86400);
        assert_eq!(config.key_prefix.as_deref(), Some("thumbnails_"));
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379/0"));
    }

    #[test]
    fn test_empty_mapping_uses_defaults() {
        let config: CacheConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, CacheConfig::default());
        assert_eq!(config.backend, CacheBackend::NoOp);
        assert_eq!(config.max_entries, 500);
    }

    #[test]
    fn test_mapping_without_backend_disables_caching() {
        let config: CacheConfig =
            serde_json::from_value(json!({"CACHE_DEFAULT_TIMEOUT": 60})).unwrap();
        assert_eq!(config.backend, CacheBackend::NoOp);
        assert_eq!(config.default_ttl_seconds, 60);
    }

    #[test]
    fn test_threshold_alias_sets_max_entries() {
        let config: CacheConfig =
            serde_json::from_value(json!({"CACHE_TYPE": "SimpleCache", "CACHE_THRESHOLD": 50}))
                .unwrap();
        assert_eq!(config.backend, CacheBackend::InMemory);
        assert_eq!(config.max_entries, 50);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config: CacheConfig =
            serde_json::from_value(json!({"backend": "memory", "CACHE_OPTIONS": {"x": 1}})).unwrap();
        assert_eq!(config.backend, CacheBackend::InMemory);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result: Result<CacheConfig, _> = serde_json::from_value(json!({"backend": "memcached"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let config = CacheConfig::default().with_default_ttl_seconds(0);
        assert_eq!(config.default_ttl(), None);

        let config = CacheConfig::default().with_default_ttl_seconds(60);
        assert_eq!(config.default_ttl(), Some(Duration::from_secs(60)));
    }
}
