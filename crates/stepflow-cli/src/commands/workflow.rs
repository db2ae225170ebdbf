//! `stepflow workflow` — Manage stored workflows and trigger runs.

use stepflow_core::models::run::{RunEntry, RunOptions};
use stepflow_core::models::workflow::{CreateWorkflowInput, WorkflowEntry, WorkflowFilter};
use stepflow_core::state::AppState;
use stepflow_core::workflow::{WorkflowDocument, WorkflowTemplate};

use super::{print_json, styled_status, truncate};

pub async fn list(
    state: &AppState,
    category: Option<String>,
    enabled: Option<bool>,
) -> Result<Vec<WorkflowEntry>, String> {
    let workflows = state
        .workflow_store
        .list(WorkflowFilter { category, enabled })
        .await
        .map_err(|e| e.to_string())?;

    if workflows.is_empty() {
        println!("No workflows found.");
        return Ok(workflows);
    }
    println!("{:<38} {:<28} {:<12} {:>5} {}", "ID", "NAME", "CATEGORY", "STEPS", "ENABLED");
    for wf in &workflows {
        println!(
            "{:<38} {:<28} {:<12} {:>5} {}",
            wf.id,
            truncate(&wf.name, 28),
            truncate(wf.category.as_deref().unwrap_or("-"), 12),
            wf.definition.steps.len(),
            wf.enabled
        );
    }
    Ok(workflows)
}

pub async fn show(state: &AppState, id: &str) -> Result<WorkflowEntry, String> {
    let workflow = get_workflow(state, id).await?;
    print_json(&workflow);
    Ok(workflow)
}

/// Create a workflow from a YAML (or JSON) document.
pub async fn create(state: &AppState, file: &str) -> Result<WorkflowEntry, String> {
    let doc = WorkflowDocument::from_file(file)?;
    let workflow = state
        .workflow_store
        .create(CreateWorkflowInput::from(doc))
        .await
        .map_err(|e| e.to_string())?;
    println!("Created workflow {} ({})", workflow.id, workflow.name);
    Ok(workflow)
}

/// Delete a workflow and its runs. Asks for confirmation unless `yes`.
pub async fn delete(state: &AppState, id: &str, yes: bool) -> Result<bool, String> {
    let workflow = get_workflow(state, id).await?;
    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Delete workflow '{}' and all of its runs?",
                workflow.name
            ))
            .default(false)
            .interact()
            .map_err(|e| format!("Failed to read confirmation: {}", e))?;
        if !confirmed {
            println!("Aborted.");
            return Ok(false);
        }
    }
    let deleted = state
        .workflow_store
        .delete(id)
        .await
        .map_err(|e| e.to_string())?;
    println!("Deleted workflow {}", id);
    Ok(deleted)
}

/// Validate a workflow file and print its execution order.
pub fn validate(file: &str) -> Result<Vec<String>, String> {
    let doc = WorkflowDocument::from_file(file)?;
    let definition = doc.definition();
    let order: Vec<String> = definition
        .execution_order()
        .map_err(|e| format!("Workflow '{}' is invalid: {}", doc.name, e))?
        .into_iter()
        .map(|s| s.id.clone())
        .collect();

    println!("Workflow '{}' is valid", doc.name);
    println!("   Steps: {}", order.len());
    for (i, id) in order.iter().enumerate() {
        if let Some(step) = definition.step(id) {
            println!("   {}. {} ({})", i + 1, step.id, step.type_name());
        }
    }
    Ok(order)
}

pub fn templates(state: &AppState) -> Vec<WorkflowTemplate> {
    let templates = state.templates.list();
    println!("{:<24} {:<28} {:<12} {}", "ID", "NAME", "CATEGORY", "STEPS");
    for t in &templates {
        println!(
            "{:<24} {:<28} {:<12} {}",
            truncate(&t.id, 24),
            truncate(&t.name, 28),
            truncate(t.category.as_deref().unwrap_or("-"), 12),
            t.definition.steps.len()
        );
    }
    templates
}

pub async fn from_template(
    state: &AppState,
    template_id: &str,
    name: Option<String>,
) -> Result<WorkflowEntry, String> {
    let workflow = state
        .create_from_template(template_id, name)
        .await
        .map_err(|e| e.to_string())?;
    println!(
        "Created workflow {} ({}) from template {}",
        workflow.id, workflow.name, template_id
    );
    Ok(workflow)
}

/// Run a stored workflow to completion and print the run record.
pub async fn run(
    state: &AppState,
    id: &str,
    notify_session_id: Option<String>,
) -> Result<RunEntry, String> {
    let run = state
        .coordinator
        .run(id, RunOptions { notify_session_id })
        .await
        .map_err(|e| e.to_string())?;
    println!("Run {} {}", run.id, styled_status(run.status));
    print_json(&run);
    Ok(run)
}

pub async fn runs(state: &AppState, id: &str) -> Result<Vec<RunEntry>, String> {
    get_workflow(state, id).await?;
    let runs = state
        .run_store
        .list_by_workflow(id)
        .await
        .map_err(|e| e.to_string())?;
    for run in &runs {
        println!(
            "{:<38} {:<20} {}",
            run.id,
            styled_status(run.status),
            run.time_created.to_rfc3339()
        );
    }
    Ok(runs)
}

async fn get_workflow(state: &AppState, id: &str) -> Result<WorkflowEntry, String> {
    state
        .workflow_store
        .get(id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Workflow {} not found", id))
}
