//! Step executor — dispatches one step to the handler for its type.
//!
//! `shell` and `api` steps are not run here: their result records the
//! command or request with a `queued` status, leaving execution to an
//! external runner. Only `skill` and `prompt` suspend on a collaborator, and
//! every step is bounded by the configured per-step timeout.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::error::StepError;
use crate::workflow::collaborators::{SkillResolver, TextGenerator};
use crate::workflow::schema::{
    ApiConfig, ConditionConfig, PromptConfig, ShellConfig, SkillConfig, Step, StepConfig,
};

/// Results accumulated so far in a run, keyed by step id.
pub type StepResults = Map<String, Value>;

/// Results of a step's declared dependencies, in declaration order.
pub type DependencyInputs<'a> = Vec<(&'a str, &'a Value)>;

const QUEUED: &str = "queued";

/// Look up the result of every dependency of `step`.
///
/// With a correct execution order this always succeeds; a gap is reported as
/// `DependencyNotSatisfied` instead of running on partial data.
pub fn dependency_inputs<'a>(
    step: &'a Step,
    results: &'a StepResults,
) -> Result<DependencyInputs<'a>, StepError> {
    step.depends_on
        .iter()
        .map(|dep| {
            results
                .get(dep)
                .map(|value| (dep.as_str(), value))
                .ok_or_else(|| StepError::DependencyNotSatisfied {
                    step: step.id.clone(),
                    dependency: dep.clone(),
                })
        })
        .collect()
}

pub struct StepExecutor {
    generator: Arc<dyn TextGenerator>,
    skills: Arc<dyn SkillResolver>,
    step_timeout: Duration,
}

impl StepExecutor {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        skills: Arc<dyn SkillResolver>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            skills,
            step_timeout,
        }
    }

    /// Execute a single step given the results of its dependencies.
    pub async fn execute(
        &self,
        step: &Step,
        inputs: &DependencyInputs<'_>,
    ) -> Result<Value, StepError> {
        match tokio::time::timeout(self.step_timeout, self.dispatch(step, inputs)).await {
            Ok(result) => result,
            Err(_) => Err(StepError::Timeout {
                step: step.id.clone(),
                secs: self.step_timeout.as_secs(),
            }),
        }
    }

    async fn dispatch(&self, step: &Step, inputs: &DependencyInputs<'_>) -> Result<Value, StepError> {
        match &step.config {
            StepConfig::Skill(config) => self.run_skill(step, config).await,
            StepConfig::Prompt(config) => self.run_prompt(step, config, inputs).await,
            StepConfig::Shell(config) => queue_shell(step, config),
            StepConfig::Api(config) => queue_api(step, config),
            StepConfig::Condition(config) => evaluate_condition(step, config, inputs),
            StepConfig::Unstructured { step_type, .. } => {
                Err(StepError::UnknownStepType(step_type.clone()))
            }
        }
    }

    async fn run_skill(&self, step: &Step, config: &SkillConfig) -> Result<Value, StepError> {
        if config.skill.trim().is_empty() {
            return Err(invalid(step, "missing 'skill'"));
        }
        if !self.skills.resolve(&config.skill).await {
            return Err(StepError::SkillNotFound(config.skill.clone()));
        }
        Ok(json!({
            "skill": config.skill,
            "applied": true,
            "params": config.params,
        }))
    }

    async fn run_prompt(
        &self,
        step: &Step,
        config: &PromptConfig,
        inputs: &DependencyInputs<'_>,
    ) -> Result<Value, StepError> {
        if config.goal.trim().is_empty() {
            return Err(invalid(step, "missing 'goal'"));
        }
        let goal = match &config.system {
            Some(system) => format!("{}\n\n{}", system, config.goal),
            None => config.goal.clone(),
        };
        let context = render_context(inputs);
        let generation = self
            .generator
            .generate(&goal, context.as_deref())
            .await
            .map_err(StepError::Generation)?;
        Ok(json!({
            "text": generation.text,
            "variables": generation.extracted_variables,
        }))
    }
}

fn queue_shell(step: &Step, config: &ShellConfig) -> Result<Value, StepError> {
    if config.command.trim().is_empty() {
        return Err(invalid(step, "missing 'command'"));
    }
    let mut result = json!({
        "command": config.command,
        "status": QUEUED,
    });
    if let Some(ref cwd) = config.cwd {
        result["cwd"] = json!(cwd);
    }
    Ok(result)
}

fn queue_api(step: &Step, config: &ApiConfig) -> Result<Value, StepError> {
    if config.url.trim().is_empty() {
        return Err(invalid(step, "missing 'url'"));
    }
    let mut result = json!({
        "url": config.url,
        "method": config.method.to_uppercase(),
        "status": QUEUED,
    });
    if let Some(ref body) = config.body {
        result["body"] = body.clone();
    }
    Ok(result)
}

/// Equality of one field of the first dependency's result.
fn evaluate_condition(
    step: &Step,
    config: &ConditionConfig,
    inputs: &DependencyInputs<'_>,
) -> Result<Value, StepError> {
    if config.field.is_empty() {
        return Err(invalid(step, "missing 'field'"));
    }
    let Some((_, upstream)) = inputs.first() else {
        return Err(invalid(step, "condition needs at least one dependency"));
    };
    let matched = upstream.get(&config.field) == Some(&config.value);
    Ok(json!({
        "matched": matched,
        "field": config.field,
        "value": config.value,
    }))
}

/// Dependency results as a pretty JSON object, or `None` without dependencies.
fn render_context(inputs: &DependencyInputs<'_>) -> Option<String> {
    if inputs.is_empty() {
        return None;
    }
    let context: Map<String, Value> = inputs
        .iter()
        .map(|(id, value)| (id.to_string(), (*value).clone()))
        .collect();
    serde_json::to_string_pretty(&context).ok()
}

fn invalid(step: &Step, message: &str) -> StepError {
    StepError::InvalidConfig {
        step: step.id.clone(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::collaborators::Generation;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGenerator {
        calls: Mutex<Vec<(String, Option<String>)>>,
        fail_with: Option<String>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, goal: &str, context: Option<&str>) -> Result<Generation, String> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls
                .lock()
                .unwrap()
                .push((goal.to_string(), context.map(str::to_string)));
            match &self.fail_with {
                Some(msg) => Err(msg.clone()),
                None => Ok(Generation {
                    text: format!("generated: {}", goal),
                    extracted_variables: vec!["topic".to_string()],
                }),
            }
        }
    }

    struct KnownSkills(Vec<&'static str>);

    #[async_trait]
    impl SkillResolver for KnownSkills {
        async fn resolve(&self, name: &str) -> bool {
            self.0.contains(&name)
        }
    }

    fn executor(generator: Arc<RecordingGenerator>) -> StepExecutor {
        StepExecutor::new(
            generator,
            Arc::new(KnownSkills(vec!["lint"])),
            Duration::from_secs(5),
        )
    }

    fn step(value: Value) -> Step {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_skill_step() {
        let exec = executor(Arc::new(RecordingGenerator::default()));
        let s = step(json!({ "id": "s", "type": "skill", "config": { "skill": "lint", "level": 2 } }));
        let out = exec.execute(&s, &vec![]).await.unwrap();
        assert_eq!(out["skill"], "lint");
        assert_eq!(out["applied"], true);
        assert_eq!(out["params"]["level"], 2);

        let missing = step(json!({ "id": "m", "type": "skill", "config": { "skill": "deploy" } }));
        assert_eq!(
            exec.execute(&missing, &vec![]).await.unwrap_err(),
            StepError::SkillNotFound("deploy".to_string())
        );
    }

    #[tokio::test]
    async fn test_prompt_step_passes_dependency_context() {
        let generator = Arc::new(RecordingGenerator::default());
        let exec = executor(generator.clone());
        let s = step(json!({ "id": "p", "type": "prompt", "config": { "goal": "Summarize" }, "dependsOn": ["a"] }));
        let upstream = json!({ "status": "ok" });
        let inputs = vec![("a", &upstream)];

        let out = exec.execute(&s, &inputs).await.unwrap();
        assert_eq!(out["text"], "generated: Summarize");
        assert_eq!(out["variables"], json!(["topic"]));

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let context: Value = serde_json::from_str(calls[0].1.as_deref().unwrap()).unwrap();
        assert_eq!(context, json!({ "a": { "status": "ok" } }));
    }

    #[tokio::test]
    async fn test_prompt_error_propagates_unchanged() {
        let exec = executor(Arc::new(RecordingGenerator {
            fail_with: Some("rate limited".to_string()),
            ..Default::default()
        }));
        let s = step(json!({ "id": "p", "type": "prompt", "config": { "goal": "Go" } }));
        let err = exec.execute(&s, &vec![]).await.unwrap_err();
        assert_eq!(err, StepError::Generation("rate limited".to_string()));
        assert_eq!(err.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn test_prompt_timeout() {
        let exec = StepExecutor::new(
            Arc::new(RecordingGenerator {
                delay: Some(Duration::from_millis(500)),
                ..Default::default()
            }),
            Arc::new(KnownSkills(vec![])),
            Duration::from_millis(20),
        );
        let s = step(json!({ "id": "slow", "type": "prompt", "config": { "goal": "Wait" } }));
        assert!(matches!(
            exec.execute(&s, &vec![]).await.unwrap_err(),
            StepError::Timeout { ref step, .. } if step == "slow"
        ));
    }

    #[tokio::test]
    async fn test_shell_and_api_are_queued() {
        let exec = executor(Arc::new(RecordingGenerator::default()));
        let sh = step(json!({ "id": "sh", "type": "shell", "config": { "command": "make", "cwd": "/srv" } }));
        assert_eq!(
            exec.execute(&sh, &vec![]).await.unwrap(),
            json!({ "command": "make", "cwd": "/srv", "status": "queued" })
        );

        let api = step(json!({ "id": "api", "type": "api", "config": { "url": "https://x.test", "method": "post" } }));
        assert_eq!(
            exec.execute(&api, &vec![]).await.unwrap(),
            json!({ "url": "https://x.test", "method": "POST", "status": "queued" })
        );

        let empty = step(json!({ "id": "e", "type": "shell", "config": {} }));
        assert!(matches!(
            exec.execute(&empty, &vec![]).await.unwrap_err(),
            StepError::InvalidConfig { .. }
        ));
    }

    #[tokio::test]
    async fn test_condition_matches_first_dependency() {
        let exec = executor(Arc::new(RecordingGenerator::default()));
        let ok = json!({ "status": "ok" });
        let other = json!({ "status": "nope" });

        let s = step(json!({ "id": "c", "type": "condition", "config": { "field": "status", "value": "ok" }, "dependsOn": ["a", "b"] }));
        let out = exec.execute(&s, &vec![("a", &ok), ("b", &other)]).await.unwrap();
        assert_eq!(out, json!({ "matched": true, "field": "status", "value": "ok" }));

        let out = exec.execute(&s, &vec![("a", &other), ("b", &ok)]).await.unwrap();
        assert_eq!(out["matched"], false);

        let orphan = step(json!({ "id": "o", "type": "condition", "config": { "field": "status", "value": "ok" } }));
        assert!(matches!(
            exec.execute(&orphan, &vec![]).await.unwrap_err(),
            StepError::InvalidConfig { .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_type_fails_closed() {
        let exec = executor(Arc::new(RecordingGenerator::default()));
        let s = step(json!({ "id": "w", "type": "webhook", "config": { "url": "x" } }));
        assert_eq!(
            exec.execute(&s, &vec![]).await.unwrap_err(),
            StepError::UnknownStepType("webhook".to_string())
        );
    }

    #[test]
    fn test_dependency_inputs_reports_gap() {
        let s = step(json!({ "id": "b", "type": "shell", "config": { "command": "x" }, "dependsOn": ["a"] }));
        let empty = StepResults::new();
        assert_eq!(
            dependency_inputs(&s, &empty).unwrap_err(),
            StepError::DependencyNotSatisfied {
                step: "b".to_string(),
                dependency: "a".to_string()
            }
        );

        let mut results = StepResults::new();
        results.insert("a".to_string(), json!(1));
        let inputs = dependency_inputs(&s, &results).unwrap();
        assert_eq!(inputs, vec![("a", &json!(1))]);
    }
}
