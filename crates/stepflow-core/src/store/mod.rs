pub mod run_store;
pub mod session_store;
pub mod workflow_store;

pub use run_store::RunStore;
pub use session_store::AgentSessionStore;
pub use workflow_store::WorkflowStore;
