use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use stepflow_core::error::ServerError;
use stepflow_core::models::run::RunOptions;
use stepflow_core::models::workflow::{CreateWorkflowInput, UpdateWorkflowInput, WorkflowFilter};
use stepflow_core::state::AppState;
use stepflow_core::workflow::{Definition, WorkflowDocument};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workflows).post(create_workflow))
        .route("/templates", get(list_templates))
        .route("/templates/{id}", post(create_from_template))
        .route("/import", post(import_workflow))
        .route("/validate", post(validate_definition))
        .route(
            "/{id}",
            get(get_workflow).patch(update_workflow).delete(delete_workflow),
        )
        .route("/{id}/run", post(run_workflow))
        .route("/{id}/runs", get(list_runs))
}

async fn list_workflows(
    State(state): State<AppState>,
    Query(filter): Query<WorkflowFilter>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let workflows = state.workflow_store.list(filter).await?;
    Ok(Json(serde_json::json!({ "workflows": workflows })))
}

async fn create_workflow(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkflowInput>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let workflow = state.workflow_store.create(body).await?;
    Ok(Json(serde_json::json!({ "workflow": workflow })))
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    match state.workflow_store.get(&id).await? {
        Some(w) => Ok(Json(serde_json::json!({ "workflow": w }))),
        None => Err(ServerError::NotFound(format!("Workflow {} not found", id))),
    }
}

async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateWorkflowInput>,
) -> Result<Json<serde_json::Value>, ServerError> {
    match state.workflow_store.update(&id, body).await? {
        Some(w) => Ok(Json(serde_json::json!({ "workflow": w }))),
        None => Err(ServerError::NotFound(format!("Workflow {} not found", id))),
    }
}

async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let deleted = state.workflow_store.delete(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

/// GET /api/workflows/templates — built-in and directory-loaded templates
async fn list_templates(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "templates": state.templates.list() }))
}

#[derive(Debug, Default, Deserialize)]
struct FromTemplateBody {
    name: Option<String>,
}

/// POST /api/workflows/templates/{id} — create a workflow from a template
async fn create_from_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServerError> {
    let body: FromTemplateBody = parse_optional_json(&body)?;
    let workflow = state.create_from_template(&id, body.name).await?;
    Ok(Json(serde_json::json!({ "workflow": workflow })))
}

/// POST /api/workflows/import — create a workflow from a YAML document
async fn import_workflow(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<serde_json::Value>, ServerError> {
    let doc = WorkflowDocument::from_yaml(&body).map_err(ServerError::BadRequest)?;
    let workflow = state
        .workflow_store
        .create(CreateWorkflowInput::from(doc))
        .await?;
    Ok(Json(serde_json::json!({ "workflow": workflow })))
}

/// POST /api/workflows/validate — check a definition without storing it
async fn validate_definition(Json(definition): Json<Definition>) -> Json<serde_json::Value> {
    match definition.execution_order() {
        Ok(order) => {
            let order: Vec<&str> = order.iter().map(|s| s.id.as_str()).collect();
            Json(serde_json::json!({ "valid": true, "order": order }))
        }
        Err(e) => Json(serde_json::json!({ "valid": false, "error": e.to_string() })),
    }
}

/// POST /api/workflows/{id}/run — execute a workflow and return its run record
async fn run_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServerError> {
    let options: RunOptions = parse_optional_json(&body)?;
    let run = state.coordinator.run(&id, options).await?;
    Ok(Json(serde_json::json!({ "run": run })))
}

async fn list_runs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if state.workflow_store.get(&id).await?.is_none() {
        return Err(ServerError::NotFound(format!("Workflow {} not found", id)));
    }
    let runs = state.run_store.list_by_workflow(&id).await?;
    Ok(Json(serde_json::json!({ "runs": runs })))
}

/// An empty body means "all defaults".
fn parse_optional_json<T>(body: &[u8]) -> Result<T, ServerError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(format!("Invalid JSON body: {}", e)))
}
