use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use stepflow_core::error::ServerError;
use stepflow_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_run))
        .route("/{id}/cancel", post(cancel_run))
}

async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    match state.run_store.get(&id).await? {
        Some(run) => Ok(Json(serde_json::json!({ "run": run }))),
        None => Err(ServerError::NotFound(format!("Run {} not found", id))),
    }
}

/// POST /api/runs/{id}/cancel — stop a pending or running run before its next step
async fn cancel_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let run = state.coordinator.cancel_run(&id).await?;
    Ok(Json(serde_json::json!({ "run": run })))
}
