//! Stepflow Core — transport-agnostic workflow execution engine.
//!
//! This crate contains the workflow data model, definition validation,
//! dependency ordering, per-step dispatch, run coordination and the SQLite
//! stores that persist workflow definitions and run records. It has **no HTTP
//! framework dependency** by default, making it suitable for use in:
//!
//! - HTTP servers (via `stepflow-server`)
//! - CLI tools (via `stepflow-cli`)
//! - Embedding in other agent platforms
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `ServerError` for use in axum handlers.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod skills;
pub mod state;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use config::EngineConfig;
pub use db::Database;
pub use error::ServerError;
pub use state::{AppState, AppStateInner};
