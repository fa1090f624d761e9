use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::pipeline::{AnswerResult, QueryOptions};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub top_k: Option<usize>,
    pub temperature: Option<f32>,
}

/// Answers one question. Missing knobs fall back to the configured
/// defaults; temperature is clamped to [0, 1] and top_k floored at 1, so
/// the only rejected input is an empty question.
pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<AnswerResult>, ApiError> {
    let options = QueryOptions {
        top_k: request
            .top_k
            .unwrap_or(state.config.retrieval.top_k)
            .max(1),
        temperature: request
            .temperature
            .unwrap_or(state.config.llm.temperature)
            .clamp(0.0, 1.0),
    };

    let result = state
        .orchestrator
        .answer(&request.question, options)
        .await?;

    Ok(Json(result))
}
