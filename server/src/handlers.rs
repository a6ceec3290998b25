use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task;

use crate::{error::ApiError, schema, state::AppState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Vec<f64>,
}

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Describes the service and the model it serves.
pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": "California Housing API. POST feature rows to /predict.",
        "model_path": state.model_path().display().to_string(),
        "feature_names": state.feature_names(),
        "target_name": state.target_name(),
    }))
}

/// Accepts one feature object or a list of them and returns one prediction
/// per row, in input order.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, ApiError> {
    let rows = schema::parse_rows(&body)?;
    let n_rows = rows.len();

    let predictions = task::spawn_blocking(move || state.predict(&rows))
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    debug!(rows = n_rows; "served predictions");
    Ok(Json(PredictionResponse { predictions }))
}
