//! `stepflow run` — Inspect and cancel workflow runs.

use stepflow_core::models::run::RunEntry;
use stepflow_core::state::AppState;

use super::{print_json, styled_status};

pub async fn show(state: &AppState, id: &str) -> Result<RunEntry, String> {
    let run = state
        .run_store
        .get(id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Run {} not found", id))?;
    println!("Run {} {}", run.id, styled_status(run.status));
    print_json(&run);
    Ok(run)
}

pub async fn cancel(state: &AppState, id: &str) -> Result<RunEntry, String> {
    let run = state
        .coordinator
        .cancel_run(id)
        .await
        .map_err(|e| e.to_string())?;
    println!("Run {} {}", run.id, styled_status(run.status));
    Ok(run)
}
