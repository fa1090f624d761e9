use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Pipeline-level error taxonomy.
///
/// `DataSource` is fatal at startup. The two provider variants are caught at
/// the orchestrator boundary and degrade to fallback search. `SearchProvider`
/// is wrapped into an error-labeled answer and never reaches the caller.
/// `EmptyQuestion` is the only error surfaced to the caller directly.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("corpus unreadable: {0}")]
    DataSource(String),
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),
    #[error("generation provider error: {0}")]
    GenerationProvider(String),
    #[error("search provider error: {0}")]
    SearchProvider(String),
    #[error("question must not be empty")]
    EmptyQuestion,
}

impl PipelineError {
    pub fn data_source<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::DataSource(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::EmbeddingProvider(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::GenerationProvider(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::EmptyQuestion => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
