//! Named application caches and their backends.
//!
//! [`CacheManager`] owns the three slots (`cache`, `tables_cache`,
//! `thumbnail_cache`). Each slot is configured with backend parameters or a
//! factory; in-memory and no-op backends are always available, Redis via the
//! `cache-redis` feature.

mod config;
mod in_memory;
mod manager;
mod noop;
mod slot;

#[cfg(feature = "cache-redis")]
mod redis;

pub use config::{CacheBackend, CacheConfig};
pub use in_memory::{InMemoryCache, InMemoryCacheBuilder};
pub use manager::CacheManager;
pub use noop::NoOpCache;
pub use slot::{CacheFactory, CacheSlot, CacheSlotConfig, CachesConfig};

#[cfg(feature = "cache-redis")]
pub use self::redis::RedisCache;
