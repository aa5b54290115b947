use serde::Deserialize;
use std::net::SocketAddr;

use crate::cache::{CacheSlot, CacheSlotConfig, CachesConfig};
use crate::error::{CacheError, Result};
use crate::utils::get_env_with_prefix;

/// Main configuration for a cacheyard application
///
/// Cache slots are part of the configuration rather than a process-wide
/// lookup, so the registry only ever sees what it is handed here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub caches: CachesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes (default: 10MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10MB default
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Config {
    /// Parse a full configuration document
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| CacheError::configuration(e.to_string()))
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
    env_error: Option<CacheError>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            env_error: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.server.max_body_size = max_body_size;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_caches(mut self, caches: CachesConfig) -> Self {
        self.config.caches = caches;
        self
    }

    /// Configure a single slot, with backend parameters or a factory
    pub fn with_cache_slot(mut self, slot: CacheSlot, config: impl Into<CacheSlotConfig>) -> Self {
        self.config.caches.set(slot, config);
        self
    }

    /// Load configuration from environment variables with CACHEYARD_ prefix
    ///
    /// A malformed cache slot variable is reported by [`build`](Self::build).
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = get_env_with_prefix("PORT") {
            if let Ok(p) = port.parse() {
                self.config.server.port = p;
            }
        }
        if let Some(max_body_size) = get_env_with_prefix("MAX_BODY_SIZE") {
            if let Ok(size) = max_body_size.parse() {
                self.config.server.max_body_size = size;
            }
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }

        // Slots without a variable keep what the builder already has
        match CachesConfig::from_env() {
            Ok(from_env) => {
                for slot in CacheSlot::ALL {
                    if get_env_with_prefix(slot.config_key()).is_some() {
                        self.config.caches.set(slot, from_env.get(slot).clone());
                    }
                }
            }
            Err(e) => self.env_error = Some(e),
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// - A cache slot environment variable that is not a JSON mapping
    /// - Invalid server address, port or body size
    /// - Invalid log level
    pub fn build(self) -> Result<Config> {
        if let Some(e) = self.env_error {
            return Err(e);
        }

        self.config.server.addr().map_err(|e| {
            CacheError::configuration(format!(
                "Invalid server address {}:{} - {}",
                self.config.server.host, self.config.server.port, e
            ))
        })?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(CacheError::configuration(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if self.config.server.port == 0 {
            return Err(CacheError::configuration("Server port must be greater than 0"));
        }

        if self.config.server.max_body_size == 0 {
            return Err(CacheError::configuration(
                "Maximum body size must be greater than 0",
            ));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, CacheConfig};
    use crate::utils::env::ENV_LOCK;
    use serde_json::json;

    #[test]
    fn test_default_config_disables_all_caches() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.server.port, 8000);
        for slot in CacheSlot::ALL {
            assert_eq!(config.caches.get(slot).params().unwrap().backend, CacheBackend::NoOp);
        }
    }

    #[test]
    fn test_from_value_full_document() {
        let config = Config::from_value(json!({
            "server": {"port": 9000},
            "caches": {
                "cache": {"backend": "memory"},
                "tables_cache": {"backend": "memory"},
                "thumbnail_cache": {"backend": "memory"}
            }
        }))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        for slot in CacheSlot::ALL {
            assert_eq!(config.caches.get(slot).params().unwrap().backend, CacheBackend::InMemory);
        }
    }

    #[test]
    fn test_from_value_rejects_non_mapping_slot() {
        let err = Config::from_value(json!({"caches": {"cache": 5}})).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_builder_validation() {
        assert!(ConfigBuilder::new().with_port(0).build().is_err());
        assert!(ConfigBuilder::new().with_log_level("loud").build().is_err());
        assert!(ConfigBuilder::new().with_host("not a host").build().is_err());
        assert!(ConfigBuilder::new().with_max_body_size(0).build().is_err());
    }

    #[test]
    fn test_with_cache_slot() {
        let config = ConfigBuilder::new()
            .with_cache_slot(CacheSlot::ThumbnailCache, CacheConfig::new(CacheBackend::InMemory))
            .build()
            .unwrap();
        assert_eq!(
            config.caches.thumbnail_cache.params().unwrap().backend,
            CacheBackend::InMemory
        );
        assert_eq!(config.caches.cache.params().unwrap().backend, CacheBackend::NoOp);
    }

    #[test]
    fn test_from_env_keeps_programmatic_slots() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        unsafe {
            std::env::set_var("CACHEYARD_CACHE_CONFIG", r#"{"CACHE_TYPE": "SimpleCache"}"#);
        }
        let result = ConfigBuilder::new()
            .with_cache_slot(CacheSlot::TablesCache, CacheConfig::new(CacheBackend::InMemory))
            .from_env()
            .build();
        unsafe {
            std::env::remove_var("CACHEYARD_CACHE_CONFIG");
        }

        let config = result.unwrap();
        assert_eq!(config.caches.cache.params().unwrap().backend, CacheBackend::InMemory);
        assert_eq!(config.caches.tables_cache.params().unwrap().backend, CacheBackend::InMemory);
        assert_eq!(config.caches.thumbnail_cache.params().unwrap().backend, CacheBackend::NoOp);
    }

    #[test]
    fn test_from_env_invalid_slot_fails_build() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        unsafe {
            std::env::set_var("CACHEYARD_THUMBNAIL_CACHE_CONFIG", "not json");
        }
        let result = ConfigBuilder::new().from_env().build();
        unsafe {
            std::env::remove_var("CACHEYARD_THUMBNAIL_CACHE_CONFIG");
        }

        assert!(result.unwrap_err().is_configuration());
    }
}
