use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::workflow::{
    CreateWorkflowInput, UpdateWorkflowInput, WorkflowEntry, WorkflowFilter,
};
use crate::workflow::schema::Definition;

const SELECT_COLUMNS: &str = "SELECT id, name, description, definition, category, tags, enabled, \
     created_at, updated_at FROM workflows";

#[derive(Clone)]
pub struct WorkflowStore {
    db: Database,
}

impl WorkflowStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new workflow. The definition is validated first; a bad
    /// graph is rejected without touching the database.
    pub async fn create(&self, input: CreateWorkflowInput) -> Result<WorkflowEntry, ServerError> {
        input.definition.validate()?;
        if input.name.trim().is_empty() {
            return Err(ServerError::BadRequest("Workflow name must not be empty".to_string()));
        }

        let now = Utc::now();
        let wf = WorkflowEntry {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            definition: input.definition,
            category: input.category,
            tags: input.tags,
            enabled: input.enabled,
            time_created: now,
            time_updated: now,
        };
        let wc = wf.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO workflows (id, name, description, definition, category, tags, \
                     enabled, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        wc.id,
                        wc.name,
                        wc.description,
                        serde_json::to_string(&wc.definition).unwrap_or_default(),
                        wc.category,
                        wc.tags.as_ref().and_then(|t| serde_json::to_string(t).ok()),
                        wc.enabled as i64,
                        wc.time_created.timestamp_millis(),
                        wc.time_updated.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        tracing::info!("Created workflow {} ({})", wf.id, wf.name);
        Ok(wf)
    }

    pub async fn get(&self, id: &str) -> Result<Option<WorkflowEntry>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                    rusqlite::params![id],
                    row_to_workflow,
                )
                .optional()
            })
            .await
    }

    pub async fn list(&self, filter: WorkflowFilter) -> Result<Vec<WorkflowEntry>, ServerError> {
        self.db
            .with_conn_async(move |conn| {
                let mut clauses: Vec<&str> = Vec::new();
                let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
                if let Some(category) = filter.category {
                    params.push(Box::new(category));
                    clauses.push("category = ?");
                }
                if let Some(enabled) = filter.enabled {
                    params.push(Box::new(enabled as i64));
                    clauses.push("enabled = ?");
                }

                let mut sql = SELECT_COLUMNS.to_string();
                if !clauses.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&clauses.join(" AND "));
                }
                sql.push_str(" ORDER BY created_at DESC");

                let mut stmt = conn.prepare(&sql)?;
                let param_refs: Vec<&dyn rusqlite::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let rows = stmt
                    .query_map(param_refs.as_slice(), row_to_workflow)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn update(
        &self,
        id: &str,
        input: UpdateWorkflowInput,
    ) -> Result<Option<WorkflowEntry>, ServerError> {
        if let Some(ref definition) = input.definition {
            definition.validate()?;
        }
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServerError::BadRequest("Workflow name must not be empty".to_string()));
        }

        // Fetch first, then apply patches, then save. A row whose definition
        // cannot be loaded fails here and is never written back.
        let existing = self.get(id).await?;
        let Some(mut wf) = existing else { return Ok(None) };
        if let Some(v) = input.name { wf.name = v; }
        if let Some(v) = input.description { wf.description = v; }
        if let Some(v) = input.definition { wf.definition = v; }
        if let Some(v) = input.category { wf.category = v; }
        if let Some(v) = input.tags { wf.tags = v; }
        if let Some(v) = input.enabled { wf.enabled = v; }
        wf.time_updated = Utc::now();
        let wc = wf.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE workflows SET name=?2, description=?3, definition=?4, category=?5, \
                     tags=?6, enabled=?7, updated_at=?8 WHERE id=?1",
                    rusqlite::params![
                        wc.id,
                        wc.name,
                        wc.description,
                        serde_json::to_string(&wc.definition).unwrap_or_default(),
                        wc.category,
                        wc.tags.as_ref().and_then(|t| serde_json::to_string(t).ok()),
                        wc.enabled as i64,
                        wc.time_updated.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(Some(wf))
    }

    /// Delete a workflow; its runs go with it (ON DELETE CASCADE).
    pub async fn delete(&self, id: &str) -> Result<bool, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute("DELETE FROM workflows WHERE id = ?1", rusqlite::params![id])?;
                Ok(n > 0)
            })
            .await
    }
}

/// Map a row to an entry. A stored definition that no longer deserializes
/// is an error; it is never replaced by an empty graph.
fn row_to_workflow(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkflowEntry> {
    use chrono::TimeZone;
    let to_dt = |ms: i64| Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now);

    let definition: Definition = parse_json_column(row, 3)?;
    let tags: Option<Vec<String>> = match row.get::<_, Option<String>>(5)? {
        Some(_) => Some(parse_json_column(row, 5)?),
        None => None,
    };

    Ok(WorkflowEntry {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        definition,
        category: row.get(4)?,
        tags,
        enabled: row.get::<_, i64>(6)? != 0,
        time_created: to_dt(row.get(7)?),
        time_updated: to_dt(row.get(8)?),
    })
}

fn parse_json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let json: String = row.get(idx)?;
    serde_json::from_str(&json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
