//! Store for agent sessions that receive run notifications.
//!
//! A session's history is a JSON array of messages. Run summaries are
//! appended as `system` messages.

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Database;
use crate::error::ServerError;
use crate::workflow::collaborators::SessionNotifier;

/// Agent session record from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSessionRow {
    pub id: String,
    pub name: Option<String>,
    pub message_history: Vec<serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone)]
pub struct AgentSessionStore {
    db: Database,
}

impl AgentSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, name: Option<String>) -> Result<AgentSessionRow, ServerError> {
        let now = chrono::Utc::now().timestamp_millis();
        let row = AgentSessionRow {
            id: Uuid::new_v4().to_string(),
            name,
            message_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let rc = row.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO agent_sessions (id, name, message_history, created_at, updated_at)
                     VALUES (?1, ?2, '[]', ?3, ?4)",
                    rusqlite::params![rc.id, rc.name, rc.created_at, rc.updated_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(row)
    }

    /// Load a session by ID.
    pub async fn get(&self, session_id: &str) -> Result<Option<AgentSessionRow>, ServerError> {
        let id = session_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT id, name, message_history, created_at, updated_at
                     FROM agent_sessions WHERE id = ?1",
                    [&id],
                    |row| {
                        let history_json: String = row.get(2)?;
                        let history: Vec<serde_json::Value> =
                            serde_json::from_str(&history_json).unwrap_or_default();
                        Ok(AgentSessionRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            message_history: history,
                            created_at: row.get(3)?,
                            updated_at: row.get(4)?,
                        })
                    },
                )
                .optional()
            })
            .await
    }

    /// Append a message to session history. Returns false if the session does not exist.
    pub async fn append_history(
        &self,
        session_id: &str,
        message: serde_json::Value,
    ) -> Result<bool, ServerError> {
        let id = session_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let history_json: Option<String> = conn
                    .query_row(
                        "SELECT message_history FROM agent_sessions WHERE id = ?1",
                        [&id],
                        |row| row.get(0),
                    )
                    .optional()?;

                let mut history: Vec<serde_json::Value> = match history_json {
                    Some(json) => serde_json::from_str(&json).unwrap_or_default(),
                    None => return Ok(false),
                };
                history.push(message);

                let new_history_json = serde_json::to_string(&history).unwrap_or_default();
                let now = chrono::Utc::now().timestamp_millis();
                conn.execute(
                    "UPDATE agent_sessions SET message_history = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![new_history_json, now, id],
                )?;
                Ok(true)
            })
            .await
    }
}

#[async_trait]
impl SessionNotifier for AgentSessionStore {
    async fn deliver(&self, session_id: &str, text: &str) -> Result<(), String> {
        let message = serde_json::json!({
            "role": "system",
            "content": text,
            "timestamp": chrono::Utc::now().timestamp_millis(),
        });
        match self.append_history(session_id, message).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!("Agent session {} not found", session_id)),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_appends_system_message() {
        let store = AgentSessionStore::new(Database::open_in_memory().unwrap());
        let session = store.create(Some("ops".to_string())).await.unwrap();

        store.deliver(&session.id, "run finished").await.unwrap();

        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.message_history.len(), 1);
        assert_eq!(loaded.message_history[0]["role"], "system");
        assert_eq!(loaded.message_history[0]["content"], "run finished");
    }

    #[tokio::test]
    async fn test_deliver_to_unknown_session_fails() {
        let store = AgentSessionStore::new(Database::open_in_memory().unwrap());
        let err = store.deliver("nope", "hello").await.unwrap_err();
        assert!(err.contains("not found"));
    }
}
