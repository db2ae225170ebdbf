//! Integration tests for the stepflow-cli commands.
//!
//! These tests exercise the same code paths as the binary, using in-memory
//! SQLite databases and fake collaborators for isolation.

use std::sync::Arc;

use async_trait::async_trait;

use stepflow_cli::commands::{init_state, run, skills, workflow};
use stepflow_core::models::run::RunStatus;
use stepflow_core::state::{AppState, AppStateInner};
use stepflow_core::workflow::collaborators::{Generation, SkillResolver, TextGenerator};
use stepflow_core::{Database, EngineConfig};

struct StaticGenerator;

#[async_trait]
impl TextGenerator for StaticGenerator {
    async fn generate(&self, _goal: &str, _context: Option<&str>) -> Result<Generation, String> {
        Ok(Generation {
            text: "Release {{version}} is ready".to_string(),
            extracted_variables: vec!["version".to_string()],
        })
    }
}

struct NoSkills;

#[async_trait]
impl SkillResolver for NoSkills {
    async fn resolve(&self, _name: &str) -> bool {
        false
    }
}

fn test_state() -> AppState {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    Arc::new(AppStateInner::with_collaborators(
        db,
        Arc::new(StaticGenerator),
        Arc::new(NoSkills),
        EngineConfig::default(),
    ))
}

const RELEASE_YAML: &str = r#"
name: Release
category: release
steps:
  - id: notes
    type: prompt
    config:
      goal: Write release notes
    dependsOn: [test]
  - id: test
    type: shell
    config:
      command: cargo test
"#;

#[tokio::test]
async fn test_create_run_and_inspect() {
    let state = test_state();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("release.yaml");
    std::fs::write(&file, RELEASE_YAML).unwrap();

    let wf = workflow::create(&state, file.to_str().unwrap()).await.unwrap();
    assert_eq!(wf.name, "Release");
    assert_eq!(wf.category.as_deref(), Some("release"));

    let listed = workflow::list(&state, Some("release".to_string()), None).await.unwrap();
    assert_eq!(listed.len(), 1);

    let finished = workflow::run(&state, &wf.id, None).await.unwrap();
    assert_eq!(finished.status, RunStatus::Completed);
    let result = finished.result.clone().unwrap();
    assert_eq!(result["notes"]["variables"][0], "version");

    let shown = run::show(&state, &finished.id).await.unwrap();
    assert_eq!(shown.id, finished.id);

    let runs = workflow::runs(&state, &wf.id).await.unwrap();
    assert_eq!(runs.len(), 1);

    let err = run::cancel(&state, &finished.id).await.unwrap_err();
    assert!(err.contains("already completed"), "{}", err);

    assert!(workflow::delete(&state, &wf.id, true).await.unwrap());
    assert!(workflow::show(&state, &wf.id).await.is_err());
}

#[tokio::test]
async fn test_failed_run_is_reported() {
    let state = test_state();
    let wf = workflow::from_template(&state, "skill-pipeline", None).await.unwrap();
    assert_eq!(wf.name, "Skill pipeline");

    let finished = workflow::run(&state, &wf.id, None).await.unwrap();
    assert_eq!(finished.status, RunStatus::Failed);
    assert!(finished.error.unwrap().contains("code-review"));
    assert!(finished.result.unwrap().is_empty());
}

#[test]
fn test_validate_file() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.yaml");
    std::fs::write(&good, RELEASE_YAML).unwrap();
    assert_eq!(
        workflow::validate(good.to_str().unwrap()).unwrap(),
        vec!["test".to_string(), "notes".to_string()]
    );

    let cyclic = dir.path().join("cyclic.yaml");
    std::fs::write(
        &cyclic,
        "name: Loop\nsteps:\n  - id: a\n    type: shell\n    config: { command: x }\n    dependsOn: [b]\n  - id: b\n    type: shell\n    config: { command: y }\n    dependsOn: [a]\n",
    )
    .unwrap();
    let err = workflow::validate(cyclic.to_str().unwrap()).unwrap_err();
    assert!(err.contains("cyclic dependency"), "{}", err);
}

#[tokio::test]
async fn test_init_state_with_template_dir() {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    std::fs::create_dir(&templates).unwrap();
    std::fs::write(templates.join("ping.yaml"), "id: ping\nname: Ping\nsteps: []\n").unwrap();
    let db_path = dir.path().join("stepflow.db");

    let state = init_state(db_path.to_str().unwrap(), templates.to_str())
        .await
        .unwrap();
    let ids: Vec<String> = workflow::templates(&state).into_iter().map(|t| t.id).collect();
    assert!(ids.contains(&"ping".to_string()));
    assert!(ids.contains(&"release-checklist".to_string()));

    let missing = init_state(db_path.to_str().unwrap(), Some("/no/such/dir")).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn test_skills_list_and_show() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join(".agents/skills/bisect");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("SKILL.md"), "# Bisect\n\nFind the commit that broke the build.\n").unwrap();

    let state = test_state();
    state.skill_registry.reload(tmp.path().to_str().unwrap());

    let listed = skills::list(&state);
    assert!(listed.iter().any(|s| s.name == "bisect"));

    let shown = skills::show(&state, "bisect").unwrap();
    assert_eq!(shown.description, "Find the commit that broke the build.");
    assert!(skills::show(&state, "stepflow-test-missing")
        .unwrap_err()
        .contains("not found"));
}
