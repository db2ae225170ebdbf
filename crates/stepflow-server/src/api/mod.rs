pub mod runs;
pub mod skills;
pub mod workflows;

use axum::Router;

use stepflow_core::state::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/workflows", workflows::router())
        .nest("/api/runs", runs::router())
        .nest("/api/skills", skills::router())
}
