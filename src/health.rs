use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppContext;
use crate::cache::{CacheManager, CacheSlot};

/// Health check status
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result for a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: Vec<ComponentHealth>,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status_code, Json(self)).into_response()
    }
}

/// Trait for implementing health checks
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    fn check(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ComponentHealth> + Send + '_>>;
}

/// Reports whether one cache slot's backend is reachable
pub struct CacheHealthCheck {
    slot: CacheSlot,
    caches: Arc<CacheManager>,
}

impl CacheHealthCheck {
    pub fn new(slot: CacheSlot, caches: Arc<CacheManager>) -> Self {
        Self { slot, caches }
    }
}

impl HealthCheck for CacheHealthCheck {
    fn name(&self) -> &str {
        self.slot.name()
    }

    fn check(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ComponentHealth> + Send + '_>> {
        Box::pin(async move {
            let client = self.caches.get(self.slot);
            let healthy = client.check_health().await;
            ComponentHealth {
                name: self.name().to_string(),
                status: if healthy {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy
                },
                message: Some(format!("{} backend", client.backend_name())),
            }
        })
    }
}

/// Health check manager that runs all registered checks
#[derive(Default)]
pub struct HealthChecker {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// One check per cache slot
    pub fn for_caches(caches: &Arc<CacheManager>) -> Self {
        CacheSlot::ALL.into_iter().fold(Self::new(), |checker, slot| {
            checker.with_check(Arc::new(CacheHealthCheck::new(slot, caches.clone())))
        })
    }

    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub async fn check_health(&self) -> HealthResponse {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        for check in &self.checks {
            let result = check.check().await;

            match result.status {
                HealthStatus::Unhealthy => overall_status = HealthStatus::Unhealthy,
                HealthStatus::Degraded if overall_status == HealthStatus::Healthy => {
                    overall_status = HealthStatus::Degraded
                }
                _ => {}
            }

            checks.push(result);
        }

        HealthResponse {
            status: overall_status,
            checks,
        }
    }
}

/// Handler for the health endpoint
pub async fn health_handler(State(ctx): State<AppContext>) -> HealthResponse {
    let checker = match ctx.caches_opt() {
        Some(caches) => HealthChecker::for_caches(caches),
        None => HealthChecker::new(),
    };
    checker.check_health().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachesConfig;
    use crate::error::Result;
    use crate::traits::cache::Cache;
    use async_trait::async_trait;
    use std::time::Duration;

    struct DownCache;

    #[async_trait]
    impl Cache for DownCache {
        async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn set_bytes(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
        fn is_healthy(&self) -> bool {
            false
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    /// Reports healthy from cached state while the backend is gone
    struct StaleCache;

    #[async_trait]
    impl Cache for StaleCache {
        async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn set_bytes(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
        fn is_healthy(&self) -> bool {
            true
        }
        async fn check_health(&self) -> bool {
            false
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[tokio::test]
    async fn test_health_uses_backend_probe() {
        let config = CachesConfig::new()
            .with_factory(CacheSlot::Cache, || Ok(Arc::new(StaleCache) as Arc<dyn Cache>));
        let caches = Arc::new(CacheManager::new(&config).unwrap());
        let response = HealthChecker::for_caches(&caches).check_health().await;

        assert_eq!(response.status, HealthStatus::Unhealthy);
        assert_eq!(response.checks[0].status, HealthStatus::Unhealthy);
        assert_eq!(response.checks[1].status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_all_slots_healthy() {
        let caches = Arc::new(CacheManager::new(&CachesConfig::default()).unwrap());
        let response = HealthChecker::for_caches(&caches).check_health().await;

        assert_eq!(response.status, HealthStatus::Healthy);
        let names: Vec<_> = response.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["cache", "tables_cache", "thumbnail_cache"]);
        assert_eq!(response.checks[0].message.as_deref(), Some("null backend"));
    }

    #[tokio::test]
    async fn test_unhealthy_slot_marks_response_unhealthy() {
        let config = CachesConfig::new().with_factory(CacheSlot::ThumbnailCache, || {
            Ok(Arc::new(DownCache) as Arc<dyn Cache>)
        });
        let caches = Arc::new(CacheManager::new(&config).unwrap());
        let response = HealthChecker::for_caches(&caches).check_health().await;

        assert_eq!(response.status, HealthStatus::Unhealthy);
        assert_eq!(response.checks[2].message.as_deref(), Some("custom backend"));
        assert_eq!(response.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
