use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The error type shared by the registry, its backends and the host app
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cache slot was configured with a shape or backend that cannot be
    /// turned into a client. Fatal at startup.
    #[error("Cache configuration error: {0}")]
    Configuration(String),

    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl CacheError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    /// Returns true for errors raised while building a registry from config
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            CacheError::Backend(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Configuration(_)
            | CacheError::Serialization(_)
            | CacheError::NotConfigured(_)
            | CacheError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Configuration details stay in the logs, not in the response body
        let message = match &self {
            CacheError::Backend(_) => "Cache backend unavailable".to_string(),
            _ => "Internal server error".to_string(),
        };

        tracing::error!(error = %self, status = status.as_u16(), "Request failed with cache error");

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
