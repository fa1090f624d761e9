use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let indexed = state.index.count().await.map_err(ApiError::internal)?;
    Ok(Json(json!({
        "status": "ok",
        "indexed": indexed,
    })))
}
