//! Run Coordinator — owns the lifecycle of one workflow execution.
//!
//! A run moves `pending -> running -> {completed | failed}`. `cancelled` is
//! set from outside via [`RunCoordinator::cancel_run`]; the coordinator
//! re-reads the record before each step and stops once it is no longer
//! `running`, leaving the cancelled record as written.
//!
//! Step failures never surface as `Err`: they are recorded on the run and the
//! failed `RunEntry` is returned. Only lookup, validation and persistence
//! errors are returned to the caller.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::ServerError;
use crate::models::run::{RunEntry, RunOptions, RunStatus};
use crate::models::workflow::WorkflowEntry;
use crate::store::{RunStore, WorkflowStore};
use crate::workflow::collaborators::SessionNotifier;
use crate::workflow::executor::{dependency_inputs, StepExecutor, StepResults};
use crate::workflow::schema::Step;

/// Error recorded on runs found `running` by [`RunCoordinator::reconcile_stale_runs`].
pub const INTERRUPTED_ERROR: &str = "run interrupted before completion";

const SUMMARY_LINE_MAX: usize = 200;

/// How the step loop ended.
enum Outcome {
    Completed(StepResults),
    Failed { results: StepResults, error: String },
    /// The record left `running` underneath us.
    Interrupted,
}

pub struct RunCoordinator {
    workflows: WorkflowStore,
    runs: RunStore,
    executor: StepExecutor,
    notifier: Arc<dyn SessionNotifier>,
    config: EngineConfig,
}

impl RunCoordinator {
    pub fn new(
        db: Database,
        executor: StepExecutor,
        notifier: Arc<dyn SessionNotifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            workflows: WorkflowStore::new(db.clone()),
            runs: RunStore::new(db),
            executor,
            notifier,
            config,
        }
    }

    /// Execute a stored workflow to a terminal state.
    ///
    /// Unknown, disabled or invalid workflows are rejected before any run
    /// record is written.
    pub async fn run(&self, workflow_id: &str, options: RunOptions) -> Result<RunEntry, ServerError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", workflow_id)))?;
        if !workflow.enabled {
            return Err(ServerError::BadRequest(format!(
                "Workflow {} is disabled",
                workflow_id
            )));
        }

        let order: Vec<Step> = workflow
            .definition
            .execution_order()?
            .into_iter()
            .cloned()
            .collect();

        let run = self
            .runs
            .create(&workflow.id, options.notify_session_id.clone())
            .await?;
        if !self.runs.start(&run.id).await? {
            tracing::info!("[Run] {} left pending before start, not executing", run.id);
            return self.load_run(&run.id).await;
        }
        tracing::info!(
            "[Run] {} started: workflow {} ({} steps)",
            run.id,
            workflow.id,
            order.len()
        );

        let applied = match self.drive(&run.id, &order).await? {
            Outcome::Completed(results) => {
                tracing::info!("[Run] {} completed", run.id);
                self.runs
                    .finish(&run.id, RunStatus::Completed, Some(results), None)
                    .await?
            }
            Outcome::Failed { results, error } => {
                tracing::warn!("[Run] {} failed: {}", run.id, error);
                self.runs
                    .finish(&run.id, RunStatus::Failed, Some(results), Some(error))
                    .await?
            }
            Outcome::Interrupted => false,
        };
        if !applied {
            tracing::info!("[Run] {} was finished externally, keeping stored state", run.id);
        }

        let finished = self.load_run(&run.id).await?;
        if let Some(session_id) = options.notify_session_id {
            self.spawn_notification(session_id, &workflow, &order, &finished);
        }
        Ok(finished)
    }

    async fn drive(&self, run_id: &str, order: &[Step]) -> Result<Outcome, ServerError> {
        let mut results = StepResults::new();
        for step in order {
            match self.runs.heartbeat(run_id).await? {
                Some(RunStatus::Running) => {}
                status => {
                    tracing::info!(
                        "[Run] {} is {:?}, stopping before step {}",
                        run_id,
                        status,
                        step.id
                    );
                    return Ok(Outcome::Interrupted);
                }
            }

            tracing::info!("[Run] {} executing step {} ({})", run_id, step.id, step.type_name());
            let outcome = match dependency_inputs(step, &results) {
                Ok(inputs) => self.executor.execute(step, &inputs).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(value) => {
                    results.insert(step.id.clone(), value);
                }
                Err(e) => {
                    return Ok(Outcome::Failed {
                        results,
                        error: format!("Step {} failed: {}", step.id, e),
                    });
                }
            }
        }
        Ok(Outcome::Completed(results))
    }

    /// Cancel a `pending` or `running` run.
    pub async fn cancel_run(&self, run_id: &str) -> Result<RunEntry, ServerError> {
        let cancelled = self
            .runs
            .cancel(run_id)
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("Run {} not found", run_id)))?;
        tracing::info!("[Run] {} cancelled", run_id);
        Ok(cancelled)
    }

    /// Mark `running` records that have not been touched for longer than
    /// `stale_run_after_secs` as failed. Returns the number of records changed.
    pub async fn reconcile_stale_runs(&self) -> Result<usize, ServerError> {
        let secs = i64::try_from(self.config.stale_run_after_secs).unwrap_or(i64::MAX);
        let Some(cutoff) = chrono::Duration::try_seconds(secs)
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let stale = self.runs.list_stale(cutoff).await?;

        let mut reconciled = 0;
        for run in stale {
            let applied = self
                .runs
                .finish(
                    &run.id,
                    RunStatus::Failed,
                    run.result.clone(),
                    Some(INTERRUPTED_ERROR.to_string()),
                )
                .await?;
            if applied {
                tracing::warn!("[Run] {} marked failed: {}", run.id, INTERRUPTED_ERROR);
                reconciled += 1;
            }
        }
        Ok(reconciled)
    }

    async fn load_run(&self, run_id: &str) -> Result<RunEntry, ServerError> {
        self.runs
            .get(run_id)
            .await?
            .ok_or_else(|| ServerError::Internal(format!("Run {} disappeared", run_id)))
    }

    fn spawn_notification(
        &self,
        session_id: String,
        workflow: &WorkflowEntry,
        order: &[Step],
        run: &RunEntry,
    ) {
        let step_ids: Vec<&str> = order.iter().map(|s| s.id.as_str()).collect();
        let text = summarize_run(&workflow.name, &step_ids, run);
        let notifier = self.notifier.clone();
        let run_id = run.id.clone();
        tokio::spawn(async move {
            match notifier.deliver(&session_id, &text).await {
                Ok(()) => tracing::debug!("[Run] {} summary sent to session {}", run_id, session_id),
                Err(e) => tracing::warn!(
                    "[Run] {} failed to notify session {}: {}",
                    run_id,
                    session_id,
                    e
                ),
            }
        });
    }
}

/// Human-readable summary of a finished run. Result lines follow
/// `step_ids`, the execution order; steps without a result are skipped.
pub fn summarize_run(workflow_name: &str, step_ids: &[&str], run: &RunEntry) -> String {
    let mut lines = vec![format!(
        "Workflow \"{}\" run {} {}",
        workflow_name, run.id, run.status
    )];
    if let Some(ref results) = run.result {
        lines.extend(
            step_ids
                .iter()
                .filter_map(|id| results.get(*id).map(|value| summary_line(id, value))),
        );
    }
    if let Some(ref error) = run.error {
        lines.push(format!("Error: {}", error));
    }
    lines.join("\n")
}

fn summary_line(step_id: &str, value: &Value) -> String {
    let compact = serde_json::to_string(value).unwrap_or_default();
    truncate(&format!("- {}: {}", step_id, compact), SUMMARY_LINE_MAX)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run_entry(status: RunStatus, result: Option<Value>, error: Option<&str>) -> RunEntry {
        let now = Utc::now();
        RunEntry {
            id: "run-1".to_string(),
            workflow_id: "wf-1".to_string(),
            status,
            result: result.and_then(|v| v.as_object().cloned()),
            error: error.map(str::to_string),
            notify_session_id: None,
            time_created: now,
            time_updated: now,
        }
    }

    #[test]
    fn test_summary_completed() {
        let run = run_entry(
            RunStatus::Completed,
            Some(json!({ "a": { "status": "ok" } })),
            None,
        );
        assert_eq!(
            summarize_run("Nightly", &["a"], &run),
            "Workflow \"Nightly\" run run-1 completed\n- a: {\"status\":\"ok\"}"
        );
    }

    #[test]
    fn test_summary_follows_execution_order() {
        let run = run_entry(
            RunStatus::Completed,
            Some(json!({ "alpha": 1, "mid": 2, "zeta": 3 })),
            None,
        );
        let summary = summarize_run("Ordered", &["zeta", "alpha", "mid"], &run);
        let ids: Vec<&str> = summary
            .lines()
            .skip(1)
            .filter_map(|l| l.strip_prefix("- "))
            .filter_map(|l| l.split(':').next())
            .collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_summary_failed_with_error_line() {
        let run = run_entry(RunStatus::Failed, Some(json!({})), Some("Step b failed: boom"));
        let summary = summarize_run("Nightly", &["a", "b"], &run);
        assert!(summary.starts_with("Workflow \"Nightly\" run run-1 failed"));
        assert!(summary.ends_with("Error: Step b failed: boom"));
    }

    #[test]
    fn test_summary_truncates_long_results() {
        let run = run_entry(
            RunStatus::Completed,
            Some(json!({ "p": { "text": "x".repeat(1000) } })),
            None,
        );
        let summary = summarize_run("Long", &["p"], &run);
        let line = summary.lines().nth(1).unwrap();
        assert_eq!(line.chars().count(), SUMMARY_LINE_MAX);
        assert!(line.ends_with("..."));
    }
}
