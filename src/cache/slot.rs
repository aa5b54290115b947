//! Named cache slots and their configuration.
//!
//! A slot is configured either with backend parameters (a JSON mapping,
//! parsed into [`CacheConfig`]) or with a factory that hands back a ready
//! client. The choice is made once, when the configuration is loaded.

use crate::cache::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::traits::cache::Cache;
use crate::utils::get_env_with_prefix;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Zero-argument constructor for a custom cache client
///
/// Errors returned by the factory reach the caller of
/// [`CacheManager::new`](crate::cache::CacheManager::new) unchanged.
pub type CacheFactory = Arc<dyn Fn() -> Result<Arc<dyn Cache>> + Send + Sync>;

/// The three named caches every application gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheSlot {
    /// General-purpose cache
    Cache,
    /// Cache of table names per schema
    TablesCache,
    /// Cache of rendered thumbnails
    ThumbnailCache,
}

impl CacheSlot {
    /// All slots, in resolution and init order
    pub const ALL: [CacheSlot; 3] = [
        CacheSlot::Cache,
        CacheSlot::TablesCache,
        CacheSlot::ThumbnailCache,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CacheSlot::Cache => "cache",
            CacheSlot::TablesCache => "tables_cache",
            CacheSlot::ThumbnailCache => "thumbnail_cache",
        }
    }

    /// Configuration key the slot is read from
    pub fn config_key(&self) -> &'static str {
        match self {
            CacheSlot::Cache => "CACHE_CONFIG",
            CacheSlot::TablesCache => "TABLE_NAMES_CACHE_CONFIG",
            CacheSlot::ThumbnailCache => "THUMBNAIL_CACHE_CONFIG",
        }
    }
}

impl fmt::Display for CacheSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How one slot obtains its client
#[derive(Clone)]
pub enum CacheSlotConfig {
    /// Build a backend client from these parameters
    Static(CacheConfig),
    /// Call this and use whatever it returns
    Factory(CacheFactory),
}

impl CacheSlotConfig {
    /// Wrap a closure as a factory configuration
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Cache>> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(factory))
    }

    /// Parse a configuration value
    ///
    /// Only a JSON object is accepted; it becomes [`CacheSlotConfig::Static`].
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => serde_json::from_value::<CacheConfig>(Value::Object(map))
                .map(Self::Static)
                .map_err(|e| CacheError::configuration(format!("invalid backend parameters: {}", e))),
            other => Err(CacheError::configuration(format!(
                "expected a mapping of backend parameters, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(self, Self::Factory(_))
    }

    /// Parameters of a static configuration
    pub fn params(&self) -> Option<&CacheConfig> {
        match self {
            Self::Static(config) => Some(config),
            Self::Factory(_) => None,
        }
    }
}

impl Default for CacheSlotConfig {
    fn default() -> Self {
        Self::Static(CacheConfig::disabled())
    }
}

impl From<CacheConfig> for CacheSlotConfig {
    fn from(config: CacheConfig) -> Self {
        Self::Static(config)
    }
}

impl fmt::Debug for CacheSlotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(config) => f.debug_tuple("Static").field(config).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for CacheSlotConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Configuration for all three cache slots
///
/// Slots that are not configured resolve to the `null` backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CachesConfig {
    #[serde(default, alias = "CACHE_CONFIG")]
    pub cache: CacheSlotConfig,

    #[serde(default, alias = "TABLE_NAMES_CACHE_CONFIG")]
    pub tables_cache: CacheSlotConfig,

    #[serde(default, alias = "THUMBNAIL_CACHE_CONFIG")]
    pub thumbnail_cache: CacheSlotConfig,
}

impl CachesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document keyed by slot name or configuration key
    ///
    /// ```rust,ignore
    /// let caches = CachesConfig::from_value(json!({
    ///     "cache": {"backend": "memory"},
    ///     "TABLE_NAMES_CACHE_CONFIG": {"CACHE_TYPE": "SimpleCache"},
    /// }))?;
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(CacheError::configuration(format!(
                "cache configuration must be a mapping of slots, got {}",
                json_kind(&value)
            )));
        }
        serde_json::from_value(value).map_err(|e| CacheError::configuration(e.to_string()))
    }

    /// Load slot configuration from environment variables
    ///
    /// Each slot's key (e.g. `CACHE_CONFIG`, or `CACHEYARD_CACHE_CONFIG`)
    /// holds a JSON object. Unset keys leave the slot disabled.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        for slot in CacheSlot::ALL {
            if let Some(raw) = get_env_with_prefix(slot.config_key()) {
                let value: Value = serde_json::from_str(&raw).map_err(|e| {
                    CacheError::configuration(format!("{}: invalid JSON: {}", slot.config_key(), e))
                })?;
                let slot_config = CacheSlotConfig::from_value(value).map_err(|e| match e {
                    CacheError::Configuration(msg) => {
                        CacheError::configuration(format!("{}: {}", slot.config_key(), msg))
                    }
                    other => other,
                })?;
                config.set(slot, slot_config);
            }
        }

        Ok(config)
    }

    pub fn get(&self, slot: CacheSlot) -> &CacheSlotConfig {
        match slot {
            CacheSlot::Cache => &self.cache,
            CacheSlot::TablesCache => &self.tables_cache,
            CacheSlot::ThumbnailCache => &self.thumbnail_cache,
        }
    }

    pub fn set(&mut self, slot: CacheSlot, config: impl Into<CacheSlotConfig>) {
        let config = config.into();
        match slot {
            CacheSlot::Cache => self.cache = config,
            CacheSlot::TablesCache => self.tables_cache = config,
            CacheSlot::ThumbnailCache => self.thumbnail_cache = config,
        }
    }

    pub fn with_slot(mut self, slot: CacheSlot, config: impl Into<CacheSlotConfig>) -> Self {
        self.set(slot, config);
        self
    }

    /// Configure a slot with a factory instead of backend parameters
    pub fn with_factory<F>(self, slot: CacheSlot, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Cache>> + Send + Sync + 'static,
    {
        self.with_slot(slot, CacheSlotConfig::factory(factory))
    }
}
