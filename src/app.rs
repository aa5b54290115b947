use std::sync::Arc;

use crate::cache::CacheManager;
use crate::error::{CacheError, Result};

/// Application context shared with every request handler
///
/// Holds the cache registry once it has been attached with
/// [`App::with_caches`](crate::App::with_caches). Handlers take
/// `State<AppContext>` and read the caches through it.
#[derive(Clone, Default)]
pub struct AppContext {
    pub caches: Option<Arc<CacheManager>>,
}

impl AppContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern for constructing AppContext
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }

    /// Get the cache registry, returning an error if not attached
    pub fn caches(&self) -> Result<&Arc<CacheManager>> {
        self.caches
            .as_ref()
            .ok_or_else(|| CacheError::not_configured("Cache registry not attached to application"))
    }

    /// Get the cache registry as an Option
    pub fn caches_opt(&self) -> Option<&Arc<CacheManager>> {
        self.caches.as_ref()
    }
}

/// Builder for AppContext with fluent API
#[must_use = "builder does nothing until you call build()"]
#[derive(Default)]
pub struct AppContextBuilder {
    caches: Option<Arc<CacheManager>>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache registry
    pub fn with_caches(mut self, caches: Arc<CacheManager>) -> Self {
        self.caches = Some(caches);
        self
    }

    pub fn build(self) -> AppContext {
        AppContext {
            caches: self.caches,
        }
    }
}
