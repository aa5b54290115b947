use crate::{
    app::AppContext,
    cache::CacheManager,
    config::Config,
    error::Result,
    health::health_handler,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Host application the cache registry is attached to
///
/// # Example
///
/// ```rust,no_run
/// use cacheyard::{App, CacheManager, ConfigBuilder};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConfigBuilder::new().from_env().build()?;
/// let caches = CacheManager::new(&config.caches)?;
///
/// let app = App::with_config(config);
/// caches.init_app(&app).await?;
///
/// app.with_caches(Arc::new(caches)).serve().await?;
/// # Ok(())
/// # }
/// ```
pub struct App {
    router: Router<AppContext>,
    config: Config,
    context: AppContext,
}

impl App {
    /// Creates a new App with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a new App with the provided configuration
    pub fn with_config(config: Config) -> Self {
        let router = Router::<AppContext>::new().route("/health", get(health_handler));

        Self {
            router,
            config,
            context: AppContext::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Attach an initialised cache registry so handlers can reach it
    pub fn with_caches(mut self, caches: Arc<CacheManager>) -> Self {
        if !caches.is_initialized() {
            tracing::warn!("Attaching caches that have not been through init_app");
        }
        self.context.caches = Some(caches);
        self
    }

    /// Merge routes that read `State<AppContext>`
    pub fn merge(mut self, router: Router<AppContext>) -> Self {
        self.router = self.router.merge(router);
        self
    }

    /// Router with context applied and without the serving middleware
    pub fn into_router(self) -> Router {
        self.router.with_state(self.context)
    }

    fn build_service(self) -> Router {
        self.router
            .layer(DefaultBodyLimit::max(self.config.server.max_body_size))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .with_state(self.context)
    }

    /// Start the application server
    pub async fn serve(self) -> std::io::Result<()> {
        let addr = self.config.server.addr().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
        })?;

        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("Server starting on http://{}", addr);
        tracing::info!("Health check available at http://{}/health", addr);

        axum::serve(listener, self.build_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the caches, build the app and attach them, failing fast
///
/// Any slot that cannot be resolved, or whose deferred setup fails, aborts
/// startup with that error.
pub async fn bootstrap(config: Config) -> Result<App> {
    let caches = CacheManager::new(&config.caches)?;
    let app = App::with_config(config);
    caches.init_app(&app).await?;
    Ok(app.with_caches(Arc::new(caches)))
}

#[derive(Clone, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let request_id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(request_id))
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give connections a grace period to close
    tokio::time::sleep(Duration::from_secs(1)).await;
    tracing::info!("Shutdown complete");
}
