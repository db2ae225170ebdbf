//! Workflow engine — validated step graphs executed into durable run records.
//!
//! # Architecture
//!
//! ```text
//! Definition ──► orderer::order_steps ──► RunCoordinator ──► RunStore
//!                                             │
//!                                        StepExecutor
//!                                             │
//!                      TextGenerator / SkillResolver (collaborators)
//!                                             │
//!                               SessionNotifier (post-run summary)
//! ```

pub mod agent_caller;
pub mod collaborators;
pub mod coordinator;
pub mod executor;
pub mod orderer;
pub mod schema;
pub mod templates;

pub use agent_caller::LlmGenerator;
pub use collaborators::{Generation, SessionNotifier, SkillResolver, TextGenerator};
pub use coordinator::{summarize_run, RunCoordinator};
pub use executor::StepExecutor;
pub use schema::{Definition, Step, StepConfig, StepType, WorkflowDocument};
pub use templates::{TemplateLoader, WorkflowTemplate};
