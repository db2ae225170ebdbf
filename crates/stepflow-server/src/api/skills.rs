//! Skills available to `skill` steps.
//!
//! GET /api/skills          — all discovered skills, sorted by name
//! GET /api/skills/{name}   — one skill, including its instructions

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use stepflow_core::error::ServerError;
use stepflow_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_skills))
        .route("/{name}", get(get_skill))
}

async fn list_skills(State(state): State<AppState>) -> Json<serde_json::Value> {
    let skills: Vec<serde_json::Value> = state
        .skill_registry
        .list_skills()
        .into_iter()
        .map(|s| {
            serde_json::json!({
                "name": s.name,
                "description": s.description,
                "tags": s.tags,
                "source": s.source,
            })
        })
        .collect();
    Json(serde_json::json!({ "skills": skills }))
}

async fn get_skill(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state
        .skill_registry
        .get_skill(&name)
        .map(|skill| Json(serde_json::json!({ "skill": skill })))
        .ok_or_else(|| ServerError::NotFound(format!("Skill {} not found", name)))
}
