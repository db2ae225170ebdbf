use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::schema::{Definition, WorkflowDocument};

/// A stored workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub definition: Definition,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub enabled: bool,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
}

/// Input for creating a new workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub definition: Definition,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl From<WorkflowDocument> for CreateWorkflowInput {
    fn from(doc: WorkflowDocument) -> Self {
        Self {
            name: doc.name,
            description: doc.description,
            definition: Definition::new(doc.steps),
            category: doc.category,
            tags: doc.tags,
            enabled: doc.enabled,
        }
    }
}

/// Partial update input for PATCH.
///
/// For the nullable fields an absent key leaves the value alone, while an
/// explicit `null` clears it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkflowInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub definition: Option<Definition>,
    #[serde(default, deserialize_with = "present")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub tags: Option<Option<Vec<String>>>,
    pub enabled: Option<bool>,
}

/// Wrap any value present in the body, `null` included, in `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Optional filters for listing workflows.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowFilter {
    pub category: Option<String>,
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_input_distinguishes_null_from_absent() {
        let absent: UpdateWorkflowInput = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(absent.category, None);
        assert_eq!(absent.tags, None);

        let cleared: UpdateWorkflowInput =
            serde_json::from_str(r#"{"category":null,"tags":null}"#).unwrap();
        assert_eq!(cleared.category, Some(None));
        assert_eq!(cleared.tags, Some(None));

        let set: UpdateWorkflowInput =
            serde_json::from_str(r#"{"category":"ops","tags":["a"]}"#).unwrap();
        assert_eq!(set.category, Some(Some("ops".to_string())));
        assert_eq!(set.tags, Some(Some(vec!["a".to_string()])));
    }
}
