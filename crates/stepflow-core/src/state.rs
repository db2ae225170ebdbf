//! Shared application state for the server and CLI.

use std::sync::Arc;

use crate::config::{EngineConfig, GeneratorConfig};
use crate::db::Database;
use crate::error::ServerError;
use crate::models::workflow::WorkflowEntry;
use crate::skills::SkillRegistry;
use crate::store::{AgentSessionStore, RunStore, WorkflowStore};
use crate::workflow::collaborators::{SessionNotifier, SkillResolver, TextGenerator};
use crate::workflow::templates::{self, TemplateLoader};
use crate::workflow::{LlmGenerator, RunCoordinator, StepExecutor};

/// Shared state accessible by all API handlers and CLI commands.
pub struct AppStateInner {
    pub db: Database,
    pub workflow_store: WorkflowStore,
    pub run_store: RunStore,
    pub session_store: AgentSessionStore,
    pub skill_registry: Arc<SkillRegistry>,
    pub templates: TemplateLoader,
    pub coordinator: RunCoordinator,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// Production wiring: LLM generator from the environment, skills from
    /// the registry, notifications into agent sessions.
    pub fn new(db: Database) -> Self {
        let skill_registry = Arc::new(SkillRegistry::new());
        let generator = Arc::new(LlmGenerator::new(GeneratorConfig::from_env()));
        Self::build(
            db,
            generator,
            skill_registry.clone(),
            skill_registry,
            EngineConfig::from_env(),
        )
    }

    /// Wiring with caller-supplied generation and skill collaborators.
    pub fn with_collaborators(
        db: Database,
        generator: Arc<dyn TextGenerator>,
        skills: Arc<dyn SkillResolver>,
        config: EngineConfig,
    ) -> Self {
        Self::build(db, generator, skills, Arc::new(SkillRegistry::new()), config)
    }

    fn build(
        db: Database,
        generator: Arc<dyn TextGenerator>,
        skills: Arc<dyn SkillResolver>,
        skill_registry: Arc<SkillRegistry>,
        config: EngineConfig,
    ) -> Self {
        let session_store = AgentSessionStore::new(db.clone());
        let notifier: Arc<dyn SessionNotifier> = Arc::new(session_store.clone());
        let executor = StepExecutor::new(generator, skills, config.step_timeout());
        Self {
            workflow_store: WorkflowStore::new(db.clone()),
            run_store: RunStore::new(db.clone()),
            coordinator: RunCoordinator::new(db.clone(), executor, notifier, config),
            session_store,
            skill_registry,
            templates: TemplateLoader::new(),
            db,
        }
    }

    /// Replace the template catalog (e.g. after loading a template directory).
    pub fn with_templates(mut self, templates: TemplateLoader) -> Self {
        self.templates = templates;
        self
    }

    pub async fn create_from_template(
        &self,
        template_id: &str,
        name: Option<String>,
    ) -> Result<WorkflowEntry, ServerError> {
        templates::create_from_template(&self.workflow_store, &self.templates, template_id, name)
            .await
    }
}
