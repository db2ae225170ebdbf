//! Stepflow Server — HTTP surface for the workflow engine.
//!
//! Exposes workflow CRUD, templates, run triggering and run inspection over
//! a JSON REST API built on axum. All domain logic lives in `stepflow-core`.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use stepflow_core::state::{AppState, AppStateInner};
use stepflow_core::workflow::TemplateLoader;
use stepflow_core::Database;

/// Configuration for the Stepflow server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    /// Optional directory of YAML workflow templates.
    pub template_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3210,
            db_path: "stepflow.db".to_string(),
            template_dir: None,
        }
    }
}

/// Create a shared `AppState` from a database path.
///
/// Loads templates from `template_dir` when given, discovers skills from
/// the working directory, and fails any run left `running` by a previous
/// process.
pub async fn create_app_state(db_path: &str, template_dir: Option<&str>) -> Result<AppState, String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;

    let mut templates = TemplateLoader::new();
    if let Some(dir) = template_dir {
        let n = templates.load_dir(dir)?;
        tracing::info!("Loaded {} templates from '{}'", n, dir);
    }

    let state: AppState = Arc::new(AppStateInner::new(db).with_templates(templates));

    // Discover skills
    let cwd = std::env::current_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| ".".to_string());
    state.skill_registry.reload(&cwd);

    match state.coordinator.reconcile_stale_runs().await {
        Ok(0) => {}
        Ok(n) => tracing::warn!("Marked {} interrupted runs as failed", n),
        Err(e) => tracing::warn!("Failed to reconcile stale runs: {}", e),
    }

    Ok(state)
}

/// Start the Stepflow HTTP server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // Ignore the error if a subscriber is already installed (e.g. by the CLI).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stepflow_server=info,stepflow_core=info,tower_http=info".into()
            }),
        )
        .try_init();

    tracing::info!(
        "Starting Stepflow server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(&config.db_path, config.template_dir.as_deref()).await?;

    start_server_with_state(config, state).await
}

/// Build the application router for `state`.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Stepflow server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "stepflow-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
