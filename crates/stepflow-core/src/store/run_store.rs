//! Persistence for workflow run records.
//!
//! Every transition is a single conditional `UPDATE`, so readers polling a run
//! see either the previous state or the next one. Terminal records are never
//! rewritten: `start`, `finish` and `cancel` only match non-terminal rows.

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::run::{RunEntry, RunStatus};

const SELECT_COLUMNS: &str = "SELECT id, workflow_id, status, result, error, notify_session_id, \
     created_at, updated_at FROM workflow_runs";

#[derive(Clone)]
pub struct RunStore {
    db: Database,
}

impl RunStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new `pending` run for `workflow_id`.
    pub async fn create(
        &self,
        workflow_id: &str,
        notify_session_id: Option<String>,
    ) -> Result<RunEntry, ServerError> {
        let now = Utc::now();
        let run = RunEntry {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            status: RunStatus::Pending,
            result: None,
            error: None,
            notify_session_id,
            time_created: now,
            time_updated: now,
        };
        let rc = run.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO workflow_runs (id, workflow_id, status, result, error, \
                     notify_session_id, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?5, ?6)",
                    rusqlite::params![
                        rc.id,
                        rc.workflow_id,
                        rc.status.as_str(),
                        rc.notify_session_id,
                        rc.time_created.timestamp_millis(),
                        rc.time_updated.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(run)
    }

    /// Move a `pending` run to `running`. Returns false if the run was no
    /// longer pending (for example, cancelled in the meantime).
    pub async fn start(&self, id: &str) -> Result<bool, ServerError> {
        let id = id.to_string();
        let now = Utc::now().timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute(
                    "UPDATE workflow_runs SET status = 'running', updated_at = ?2 \
                     WHERE id = ?1 AND status = 'pending'",
                    rusqlite::params![id, now],
                )?;
                Ok(n > 0)
            })
            .await
    }

    /// Write the terminal state of a run. Returns false if the run had already
    /// reached a terminal state, in which case nothing is changed.
    pub async fn finish(
        &self,
        id: &str,
        status: RunStatus,
        result: Option<Map<String, Value>>,
        error: Option<String>,
    ) -> Result<bool, ServerError> {
        if !status.is_terminal() {
            return Err(ServerError::Internal(format!(
                "Cannot finish run {} with non-terminal status {}",
                id, status
            )));
        }
        let id = id.to_string();
        let result_json = result.and_then(|r| serde_json::to_string(&r).ok());
        let now = Utc::now().timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute(
                    "UPDATE workflow_runs SET status = ?2, result = ?3, error = ?4, updated_at = ?5 \
                     WHERE id = ?1 AND status IN ('pending', 'running')",
                    rusqlite::params![id, status.as_str(), result_json, error, now],
                )?;
                Ok(n > 0)
            })
            .await
    }

    /// Administrative cancellation of a `pending` or `running` run.
    ///
    /// Returns `Ok(None)` for an unknown id and `Conflict` if the run has
    /// already finished.
    pub async fn cancel(&self, id: &str) -> Result<Option<RunEntry>, ServerError> {
        let Some(existing) = self.get(id).await? else { return Ok(None) };
        if existing.status.is_terminal() {
            return Err(ServerError::Conflict(format!(
                "Run {} is already {}",
                id, existing.status
            )));
        }
        let applied = self
            .finish(
                id,
                RunStatus::Cancelled,
                existing.result.clone(),
                Some("Run cancelled".to_string()),
            )
            .await?;
        if !applied {
            // Finished between the read and the write.
            let current = self.get(id).await?;
            let status = current.as_ref().map(|r| r.status).unwrap_or(RunStatus::Pending);
            return Err(ServerError::Conflict(format!("Run {} is already {}", id, status)));
        }
        self.get(id).await
    }

    /// Refresh `updated_at` on a running record and report its current status.
    /// Only the timestamp is touched; status is read, never written.
    pub async fn heartbeat(&self, id: &str) -> Result<Option<RunStatus>, ServerError> {
        let id = id.to_string();
        let now = Utc::now().timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE workflow_runs SET updated_at = ?2 WHERE id = ?1 AND status = 'running'",
                    rusqlite::params![id, now],
                )?;
                conn.query_row(
                    "SELECT status FROM workflow_runs WHERE id = ?1",
                    rusqlite::params![id],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map(|s| s.map(|s| RunStatus::from_str(&s)))
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<RunEntry>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                    rusqlite::params![id],
                    |row| Ok(row_to_run(row)),
                )
                .optional()
            })
            .await
    }

    pub async fn list_by_workflow(&self, workflow_id: &str) -> Result<Vec<RunEntry>, ServerError> {
        let wf = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE workflow_id = ?1 ORDER BY created_at DESC",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![wf], |row| Ok(row_to_run(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// `running` records whose last update is older than `before`.
    pub async fn list_stale(&self, before: DateTime<Utc>) -> Result<Vec<RunEntry>, ServerError> {
        let cutoff = before.timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE status = 'running' AND updated_at < ?1 ORDER BY created_at",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![cutoff], |row| Ok(row_to_run(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

fn row_to_run(row: &rusqlite::Row<'_>) -> RunEntry {
    use chrono::TimeZone;
    let to_dt = |ms: Option<i64>| ms.and_then(|v| Utc.timestamp_millis_opt(v).single());

    let status: String = row.get(2).unwrap_or_default();
    let result: Option<Map<String, Value>> = row
        .get::<_, Option<String>>(3)
        .unwrap_or(None)
        .and_then(|json| serde_json::from_str(&json).ok());

    RunEntry {
        id: row.get(0).unwrap_or_default(),
        workflow_id: row.get(1).unwrap_or_default(),
        status: RunStatus::from_str(&status),
        result,
        error: row.get(4).unwrap_or(None),
        notify_session_id: row.get(5).unwrap_or(None),
        time_created: to_dt(row.get(6).ok()).unwrap_or_else(Utc::now),
        time_updated: to_dt(row.get(7).ok()).unwrap_or_else(Utc::now),
    }
}
