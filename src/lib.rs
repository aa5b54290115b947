//! cacheyard - named cache registry for Axum applications
//!
//! An application gets three caches: a general-purpose `cache`, a
//! `tables_cache` for table-name listings and a `thumbnail_cache`. Each is
//! configured independently, either with backend parameters or with a
//! factory returning a ready client, resolved once at startup and attached
//! to the application before it serves.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cacheyard::{self, ConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     cacheyard::init_tracing();
//!
//!     // CACHE_CONFIG='{"backend": "memory"}' etc.
//!     let config = ConfigBuilder::new().from_env().build()?;
//!
//!     let app = cacheyard::bootstrap(config).await?;
//!     app.serve().await?;
//!     Ok(())
//! }
//! ```

#![allow(async_fn_in_trait)] // CacheExt is used on concrete types and dyn Cache, never spawned generically

mod app;
pub mod cache;
mod config;
mod core;
mod error;
pub mod health;
pub mod traits;
mod utils;

// Re-exports for public API
pub use app::{AppContext, AppContextBuilder};
pub use cache::{
    CacheBackend, CacheConfig, CacheFactory, CacheManager, CacheSlot, CacheSlotConfig,
    CachesConfig,
};
pub use config::{Config, ConfigBuilder, LoggingConfig, ServerConfig};
pub use self::core::{App, bootstrap};
pub use error::{CacheError, Result};
pub use health::{ComponentHealth, HealthCheck, HealthChecker, HealthStatus};
pub use traits::cache::{Cache, CacheExt};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "cacheyard=debug")
/// - `CACHEYARD_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install_subscriber(env_filter, json_logs);
}

/// Initialize tracing from a loaded configuration
pub fn init_tracing_with_config(config: &Config) {
    install_subscriber(EnvFilter::new(&config.logging.level), config.logging.json);
}

fn install_subscriber(env_filter: EnvFilter, json: bool) {
    // try_init: a subscriber may already be installed (tests, embedding apps)
    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
