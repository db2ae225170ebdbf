//! Schema types for workflow definitions.
//!
//! A definition is an unordered set of typed steps plus their dependency
//! edges. The same shape is accepted as JSON (stored definitions, HTTP
//! bodies) and YAML (workflow files and templates):
//!
//! ```yaml
//! name: "Summarize and check"
//! description: "Summarize a topic, then verify the summary was produced"
//! category: "research"
//! tags: ["llm", "demo"]
//!
//! steps:
//!   - id: summarize
//!     name: "Summarize"
//!     type: prompt
//!     config:
//!       goal: "Summarize the latest release notes"
//!
//!   - id: check
//!     name: "Check"
//!     type: condition
//!     config:
//!       field: "text"
//!       value: ""
//!     dependsOn: [summarize]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::workflow::orderer;

/// The kinds of work a step can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Skill,
    Prompt,
    Shell,
    Api,
    Condition,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Prompt => "prompt",
            Self::Shell => "shell",
            Self::Api => "api",
            Self::Condition => "condition",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "skill" => Some(Self::Skill),
            "prompt" => Some(Self::Prompt),
            "shell" => Some(Self::Shell),
            "api" => Some(Self::Api),
            "condition" => Some(Self::Condition),
            _ => None,
        }
    }
}

/// Applies a named skill from the skill catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkillConfig {
    #[serde(default, alias = "name")]
    pub skill: String,
    /// Everything else in the step config, passed through with the result.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Delegates a generation request to the text-generation collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default, alias = "prompt")]
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

/// Records a command for an external runner; never executed inline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

/// Records an API call for an external runner; never executed inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default, alias = "endpoint")]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: default_method(),
            body: None,
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// Field-equality check against the result of the first dependency.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

/// Per-type step configuration.
///
/// Step types this engine does not know are kept as `Unstructured` so stored
/// definitions round-trip unchanged; executing one fails with
/// `UnknownStepType`.
#[derive(Debug, Clone, PartialEq)]
pub enum StepConfig {
    Skill(SkillConfig),
    Prompt(PromptConfig),
    Shell(ShellConfig),
    Api(ApiConfig),
    Condition(ConditionConfig),
    Unstructured {
        step_type: String,
        values: Map<String, Value>,
    },
}

impl StepConfig {
    /// The step's `type` as it appears on the wire.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Skill(_) => StepType::Skill.as_str(),
            Self::Prompt(_) => StepType::Prompt.as_str(),
            Self::Shell(_) => StepType::Shell.as_str(),
            Self::Api(_) => StepType::Api.as_str(),
            Self::Condition(_) => StepType::Condition.as_str(),
            Self::Unstructured { step_type, .. } => step_type,
        }
    }

    pub fn step_type(&self) -> Option<StepType> {
        StepType::parse(self.type_name())
    }

    fn from_parts(step_type: &str, config: Value) -> Result<Self, String> {
        let config = match config {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let parsed = match StepType::parse(step_type) {
            Some(StepType::Skill) => serde_json::from_value(config).map(Self::Skill),
            Some(StepType::Prompt) => serde_json::from_value(config).map(Self::Prompt),
            Some(StepType::Shell) => serde_json::from_value(config).map(Self::Shell),
            Some(StepType::Api) => serde_json::from_value(config).map(Self::Api),
            Some(StepType::Condition) => serde_json::from_value(config).map(Self::Condition),
            None => {
                return match config {
                    Value::Object(values) => Ok(Self::Unstructured {
                        step_type: step_type.to_string(),
                        values,
                    }),
                    other => Err(format!("config must be an object, got {}", other)),
                };
            }
        };
        parsed.map_err(|e| format!("invalid {} config: {}", step_type, e))
    }

    fn to_value(&self) -> Value {
        let value = match self {
            Self::Skill(c) => serde_json::to_value(c),
            Self::Prompt(c) => serde_json::to_value(c),
            Self::Shell(c) => serde_json::to_value(c),
            Self::Api(c) => serde_json::to_value(c),
            Self::Condition(c) => serde_json::to_value(c),
            Self::Unstructured { values, .. } => Ok(Value::Object(values.clone())),
        };
        value.unwrap_or_default()
    }
}

/// One typed unit of work within a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub struct Step {
    /// Unique within the definition; dependency edges refer to it.
    pub id: String,
    pub name: String,
    pub config: StepConfig,
    /// Ids of steps whose results must exist before this one runs.
    pub depends_on: Vec<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, config: StepConfig) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            config,
            depends_on: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn type_name(&self) -> &str {
        self.config.type_name()
    }
}

/// Wire form of a step: `{id, name, type, config, dependsOn}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStep {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    step_type: String,
    #[serde(default)]
    config: Value,
    #[serde(default, alias = "depends_on")]
    depends_on: Vec<String>,
}

impl TryFrom<RawStep> for Step {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let config = StepConfig::from_parts(&raw.step_type, raw.config)
            .map_err(|e| format!("step '{}': {}", raw.id, e))?;
        let name = if raw.name.is_empty() {
            raw.id.clone()
        } else {
            raw.name
        };
        Ok(Step {
            id: raw.id,
            name,
            config,
            depends_on: raw.depends_on,
        })
    }
}

impl From<Step> for RawStep {
    fn from(step: Step) -> Self {
        RawStep {
            step_type: step.type_name().to_string(),
            config: step.config.to_value(),
            id: step.id,
            name: step.name,
            depends_on: step.depends_on,
        }
    }
}

/// The declared steps of a workflow. Declaration order is not execution order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Definition {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Check id uniqueness, dependency resolution and acyclicity, in that order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        orderer::order_steps(&self.steps).map(|_| ())
    }

    /// The steps in dependency order.
    pub fn execution_order(&self) -> Result<Vec<&Step>, ValidationError> {
        orderer::order_steps(&self.steps)
    }
}

/// A complete workflow document as written in a YAML/JSON file or template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    /// Only meaningful for templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_enabled() -> bool {
    true
}

impl WorkflowDocument {
    /// Parse a workflow document from a YAML string (JSON is valid YAML).
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse workflow YAML: {}", e))
    }

    /// Load a workflow document from a file path.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read workflow file '{}': {}", path, e))?;
        Self::from_yaml(&content)
    }

    pub fn definition(&self) -> Definition {
        Definition::new(self.steps.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_typed_steps() {
        let def: Definition = serde_json::from_value(json!({
            "steps": [
                { "id": "s1", "name": "Apply", "type": "skill", "config": { "skill": "lint", "strict": true } },
                { "id": "s2", "type": "prompt", "config": { "goal": "Summarize" }, "dependsOn": ["s1"] },
                { "id": "s3", "type": "shell", "config": { "command": "make test" } },
                { "id": "s4", "type": "api", "config": { "url": "https://example.com" } },
                { "id": "s5", "type": "condition", "config": { "field": "status", "value": "ok" }, "dependsOn": ["s4"] }
            ]
        }))
        .unwrap();

        assert_eq!(def.steps.len(), 5);
        match &def.steps[0].config {
            StepConfig::Skill(c) => {
                assert_eq!(c.skill, "lint");
                assert_eq!(c.params.get("strict"), Some(&json!(true)));
            }
            other => panic!("expected skill config, got {:?}", other),
        }
        assert_eq!(def.steps[1].name, "s2");
        assert_eq!(def.steps[1].depends_on, vec!["s1".to_string()]);
        match &def.steps[3].config {
            StepConfig::Api(c) => assert_eq!(c.method, "GET"),
            other => panic!("expected api config, got {:?}", other),
        }
        assert_eq!(def.steps[4].config.step_type(), Some(StepType::Condition));
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let raw = json!({
            "id": "x",
            "name": "Future step",
            "type": "webhook",
            "config": { "target": "ops" },
            "dependsOn": []
        });
        let step: Step = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(step.type_name(), "webhook");
        assert!(step.config.step_type().is_none());

        let back = serde_json::to_value(&step).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_missing_config_defaults_to_empty() {
        let step: Step =
            serde_json::from_value(json!({ "id": "c", "type": "condition" })).unwrap();
        assert_eq!(step.config, StepConfig::Condition(ConditionConfig::default()));
    }

    #[test]
    fn test_malformed_typed_config_is_rejected() {
        let result: Result<Step, _> = serde_json::from_value(json!({
            "id": "bad",
            "type": "shell",
            "config": { "command": 42 }
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("step 'bad'"), "unexpected error: {}", err);
    }

    #[test]
    fn test_parse_workflow_document_yaml() {
        let yaml = r#"
name: "Release"
description: "Cut a release"
category: "ops"
tags: ["release"]
steps:
  - id: build
    type: shell
    config:
      command: "cargo build --release"
  - id: announce
    name: "Announce"
    type: api
    config:
      url: "https://chat.example.com/hooks/release"
      method: POST
    dependsOn: [build]
"#;
        let doc = WorkflowDocument::from_yaml(yaml).unwrap();
        assert_eq!(doc.name, "Release");
        assert!(doc.enabled);
        assert_eq!(doc.tags, Some(vec!["release".to_string()]));
        let def = doc.definition();
        assert_eq!(def.steps.len(), 2);
        assert_eq!(def.step("announce").map(|s| s.name.as_str()), Some("Announce"));
        assert!(def.validate().is_ok());
    }
}
