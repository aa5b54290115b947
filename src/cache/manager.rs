//! The cache registry: three named slots, resolved once, shared read-only.

use crate::cache::config::{CacheBackend, CacheConfig};
use crate::cache::slot::{CacheSlot, CacheSlotConfig, CachesConfig};
use crate::cache::{InMemoryCache, NoOpCache};
use crate::core::App;
use crate::error::Result;
use crate::traits::cache::Cache;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

#[cfg(feature = "cache-redis")]
use crate::cache::RedisCache;

/// Registry holding the application's named caches
///
/// Built once at startup from a [`CachesConfig`]; each slot is resolved
/// exactly once. After [`init_app`](Self::init_app) the registry is only
/// read, so it can be shared as `Arc<CacheManager>` without locking.
///
/// # Example
///
/// ```rust,ignore
/// let caches = CacheManager::new(&config.caches)?;
/// let app = App::with_config(config);
/// caches.init_app(&app).await?;
///
/// let names: Option<Vec<String>> = caches.tables_cache().get("schema:public").await?;
/// ```
pub struct CacheManager {
    cache: Arc<dyn Cache>,
    tables_cache: Arc<dyn Cache>,
    thumbnail_cache: Arc<dyn Cache>,
    initialized: AtomicBool,
}

impl CacheManager {
    /// Resolve every slot of `config` into a client
    ///
    /// Stops at the first slot that fails and returns its error unchanged.
    pub fn new(config: &CachesConfig) -> Result<Self> {
        let cache = Self::setup_slot(CacheSlot::Cache, config.get(CacheSlot::Cache))?;
        let tables_cache = Self::setup_slot(CacheSlot::TablesCache, config.get(CacheSlot::TablesCache))?;
        let thumbnail_cache =
            Self::setup_slot(CacheSlot::ThumbnailCache, config.get(CacheSlot::ThumbnailCache))?;

        Ok(Self {
            cache,
            tables_cache,
            thumbnail_cache,
            initialized: AtomicBool::new(false),
        })
    }

    /// Turn one slot configuration into a client
    ///
    /// Backend parameters build the matching backend; a factory is invoked
    /// once and its result used as-is.
    pub fn resolve(config: &CacheSlotConfig) -> Result<Arc<dyn Cache>> {
        match config {
            CacheSlotConfig::Static(params) => build_backend(params),
            CacheSlotConfig::Factory(factory) => factory(),
        }
    }

    fn setup_slot(slot: CacheSlot, config: &CacheSlotConfig) -> Result<Arc<dyn Cache>> {
        let client = Self::resolve(config)?;
        info!(
            slot = slot.name(),
            config_key = slot.config_key(),
            backend = client.backend_name(),
            source = if config.is_factory() { "factory" } else { "static" },
            "Cache slot resolved"
        );
        Ok(client)
    }

    /// Run every client's deferred setup against the constructed app
    ///
    /// Each client is initialised once per call, in slot order; the first
    /// error is returned. Calling this more than once is up to the caller.
    pub async fn init_app(&self, app: &App) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("CacheManager::init_app called again; clients will be re-initialised");
        }

        for (slot, client) in self.iter() {
            debug!(slot = slot.name(), backend = client.backend_name(), "Initialising cache");
            client.init_app(app).await?;
        }

        info!("Caches attached to application");
        Ok(())
    }

    /// Whether `init_app` has been called at least once
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// General-purpose cache
    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Table-name cache
    pub fn tables_cache(&self) -> &Arc<dyn Cache> {
        &self.tables_cache
    }

    /// Thumbnail cache
    pub fn thumbnail_cache(&self) -> &Arc<dyn Cache> {
        &self.thumbnail_cache
    }

    pub fn get(&self, slot: CacheSlot) -> &Arc<dyn Cache> {
        match slot {
            CacheSlot::Cache => &self.cache,
            CacheSlot::TablesCache => &self.tables_cache,
            CacheSlot::ThumbnailCache => &self.thumbnail_cache,
        }
    }

    /// All slots with their clients, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (CacheSlot, &Arc<dyn Cache>)> + '_ {
        CacheSlot::ALL.into_iter().map(move |slot| (slot, self.get(slot)))
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("cache", &self.cache.backend_name())
            .field("tables_cache", &self.tables_cache.backend_name())
            .field("thumbnail_cache", &self.thumbnail_cache.backend_name())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

fn build_backend(params: &CacheConfig) -> Result<Arc<dyn Cache>> {
    match params.backend {
        CacheBackend::InMemory => Ok(Arc::new(InMemoryCache::from_config(params))),
        CacheBackend::NoOp => Ok(Arc::new(NoOpCache)),
        #[cfg(feature = "cache-redis")]
        CacheBackend::Redis => Ok(Arc::new(RedisCache::from_config(params)?)),
        #[cfg(not(feature = "cache-redis"))]
        CacheBackend::Redis => {
            tracing::warn!("Redis cache requested but cache-redis feature not enabled");
            Err(crate::error::CacheError::configuration(
                "redis backend requested but the cache-redis feature is not enabled",
            ))
        }
    }
}
