//! Workflow templates — reusable definitions new workflows are created from.
//!
//! A handful of templates are built in. More can be dropped into a directory
//! as YAML workflow documents:
//!
//! ```yaml
//! id: "nightly-digest"
//! name: "Nightly digest"
//! category: "reporting"
//! steps:
//!   - id: fetch
//!     type: api
//!     config: { url: "https://ci.example.com/api/builds" }
//!   - id: digest
//!     type: prompt
//!     config: { goal: "Summarize last night's builds" }
//!     dependsOn: [fetch]
//! ```
//!
//! A file template replaces a built-in with the same id.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ServerError;
use crate::models::workflow::{CreateWorkflowInput, WorkflowEntry};
use crate::store::WorkflowStore;
use crate::workflow::schema::{
    ApiConfig, ConditionConfig, Definition, PromptConfig, ShellConfig, SkillConfig, Step,
    StepConfig, WorkflowDocument,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub definition: Definition,
}

impl WorkflowTemplate {
    /// Load a template from a YAML workflow document. The id defaults to
    /// the file stem.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let doc = WorkflowDocument::from_file(path)?;
        let id = doc.id.clone().unwrap_or_else(|| {
            Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        });
        let definition = doc.definition();
        definition
            .validate()
            .map_err(|e| format!("Invalid template '{}': {}", path, e))?;
        Ok(Self {
            id,
            name: doc.name,
            description: doc.description,
            category: doc.category,
            tags: doc.tags.unwrap_or_default(),
            definition,
        })
    }

    /// Input for a new workflow built from this template.
    pub fn to_create_input(&self, name: Option<String>) -> CreateWorkflowInput {
        CreateWorkflowInput {
            name: name.unwrap_or_else(|| self.name.clone()),
            description: self.description.clone(),
            definition: self.definition.clone(),
            category: self.category.clone(),
            tags: Some(self.tags.clone()),
            enabled: true,
        }
    }
}

/// Built-in templates plus any loaded from disk, indexed by id.
pub struct TemplateLoader {
    templates: HashMap<String, WorkflowTemplate>,
}

impl Default for TemplateLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateLoader {
    /// A loader holding only the built-in templates.
    pub fn new() -> Self {
        let templates = builtin_templates()
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        Self { templates }
    }

    /// Load all `.yaml`/`.yml` templates from a directory.
    pub fn load_dir(&mut self, dir: &str) -> Result<usize, String> {
        let dir_path = Path::new(dir);
        if !dir_path.is_dir() {
            return Err(format!("Template directory '{}' does not exist", dir));
        }

        let mut count = 0;
        for entry in std::fs::read_dir(dir_path)
            .map_err(|e| format!("Failed to read directory '{}': {}", dir, e))?
        {
            let entry = entry.map_err(|e| format!("Directory entry error: {}", e))?;
            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !matches!(ext, "yaml" | "yml") {
                continue;
            }

            let template = WorkflowTemplate::from_file(path.to_str().unwrap_or(""))?;
            tracing::info!("[TemplateLoader] Loaded template: {} ({})", template.id, template.name);
            self.templates.insert(template.id.clone(), template);
            count += 1;
        }

        Ok(count)
    }

    pub fn get(&self, id: &str) -> Option<&WorkflowTemplate> {
        self.templates.get(id)
    }

    /// All templates, sorted by id.
    pub fn list(&self) -> Vec<WorkflowTemplate> {
        let mut templates: Vec<WorkflowTemplate> = self.templates.values().cloned().collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        templates
    }
}

/// Create and store a workflow from the template `template_id`.
pub async fn create_from_template(
    store: &WorkflowStore,
    templates: &TemplateLoader,
    template_id: &str,
    name: Option<String>,
) -> Result<WorkflowEntry, ServerError> {
    let template = templates
        .get(template_id)
        .ok_or_else(|| ServerError::NotFound(format!("Template {} not found", template_id)))?;
    store.create(template.to_create_input(name)).await
}

fn builtin_templates() -> Vec<WorkflowTemplate> {
    vec![
        WorkflowTemplate {
            id: "summarize-and-check".to_string(),
            name: "Summarize and check".to_string(),
            description: "Fetch a status endpoint, summarize it and check it was queued".to_string(),
            category: Some("analysis".to_string()),
            tags: vec!["summary".to_string(), "api".to_string()],
            definition: Definition::new(vec![
                Step::new(
                    "collect",
                    StepConfig::Api(ApiConfig {
                        url: "https://example.com/api/status".to_string(),
                        ..Default::default()
                    }),
                )
                .with_name("Collect status"),
                Step::new(
                    "summarize",
                    StepConfig::Prompt(PromptConfig {
                        goal: "Summarize the collected status in three bullet points".to_string(),
                        system: None,
                    }),
                )
                .with_name("Summarize")
                .depends_on(["collect"]),
                Step::new(
                    "check",
                    StepConfig::Condition(ConditionConfig {
                        field: "status".to_string(),
                        value: json!("queued"),
                    }),
                )
                .with_name("Check request state")
                .depends_on(["collect"]),
            ]),
        },
        WorkflowTemplate {
            id: "skill-pipeline".to_string(),
            name: "Skill pipeline".to_string(),
            description: "Review code with a skill, plan fixes, then apply a refactoring skill"
                .to_string(),
            category: Some("skills".to_string()),
            tags: vec!["skills".to_string(), "review".to_string()],
            definition: Definition::new(vec![
                Step::new(
                    "review",
                    StepConfig::Skill(SkillConfig {
                        skill: "code-review".to_string(),
                        ..Default::default()
                    }),
                )
                .with_name("Review"),
                Step::new(
                    "plan",
                    StepConfig::Prompt(PromptConfig {
                        goal: "Turn the review findings into an ordered fix plan".to_string(),
                        system: None,
                    }),
                )
                .with_name("Plan fixes")
                .depends_on(["review"]),
                Step::new(
                    "refactor",
                    StepConfig::Skill(SkillConfig {
                        skill: "refactor".to_string(),
                        ..Default::default()
                    }),
                )
                .with_name("Apply refactoring")
                .depends_on(["plan"]),
            ]),
        },
        WorkflowTemplate {
            id: "release-checklist".to_string(),
            name: "Release checklist".to_string(),
            description: "Queue tests, draft release notes and publish once checks pass"
                .to_string(),
            category: Some("release".to_string()),
            tags: vec!["release".to_string()],
            definition: Definition::new(vec![
                Step::new(
                    "test",
                    StepConfig::Shell(ShellConfig {
                        command: "cargo test --workspace".to_string(),
                        cwd: None,
                    }),
                )
                .with_name("Run tests"),
                Step::new(
                    "notes",
                    StepConfig::Prompt(PromptConfig {
                        goal: "Draft release notes for version {{version}}".to_string(),
                        system: Some("You write concise changelogs.".to_string()),
                    }),
                )
                .with_name("Release notes")
                .depends_on(["test"]),
                Step::new(
                    "gate",
                    StepConfig::Condition(ConditionConfig {
                        field: "status".to_string(),
                        value: json!("queued"),
                    }),
                )
                .with_name("Tests queued")
                .depends_on(["test"]),
                Step::new(
                    "publish",
                    StepConfig::Api(ApiConfig {
                        url: "https://example.com/api/releases".to_string(),
                        method: "POST".to_string(),
                        body: None,
                    }),
                )
                .with_name("Publish")
                .depends_on(["notes", "gate"]),
            ]),
        },
    ]
}
