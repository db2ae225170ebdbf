//! Contracts for the external components the engine calls into.
//!
//! The engine owns none of these; it only needs the narrow surface below.
//! Default implementations live next to their backing resources:
//! [`LlmGenerator`](crate::workflow::agent_caller::LlmGenerator),
//! [`SkillRegistry`](crate::skills::SkillRegistry) and
//! [`AgentSessionStore`](crate::store::AgentSessionStore).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Output of a text-generation request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub text: String,
    pub extracted_variables: Vec<String>,
}

/// Text generation (LLM-backed in production).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `goal`, optionally grounded in `context`.
    /// Any error is a provider-specific message; the engine treats it as a step failure.
    async fn generate(&self, goal: &str, context: Option<&str>) -> Result<Generation, String>;
}

/// Skill catalog lookup. Only existence matters to the engine.
#[async_trait]
pub trait SkillResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> bool;
}

/// Delivery of a human-readable message into an agent session.
#[async_trait]
pub trait SessionNotifier: Send + Sync {
    async fn deliver(&self, session_id: &str, text: &str) -> Result<(), String>;
}

/// Find `{{name}}` placeholders in generated text, in first-seen order.
pub fn extract_variables(text: &str) -> Vec<String> {
    let re = match regex::Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}\}") {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };
    let mut vars: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let name = caps[1].to_string();
        if !vars.contains(&name) {
            vars.push(name);
        }
    }
    vars
}
