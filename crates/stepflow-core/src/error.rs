//! Core error types for the Stepflow engine.
//!
//! `ServerError` is used throughout the core domain (stores, coordinator, etc.).
//! When the `axum` feature is enabled, it also implements `IntoResponse`
//! so it can be used directly as an axum handler error type.
//!
//! Graph-shape problems are reported as [`ValidationError`] and never reach
//! execution. Failures inside a single step are [`StepError`]s; the run
//! coordinator records those on the run instead of returning them.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid workflow definition: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Structural problems with a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    /// The ids forming the cycle, with the first id repeated at the end.
    #[error("cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
}

/// Failure of a single step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("unknown step type '{0}'")]
    UnknownStepType(String),

    #[error("skill '{0}' could not be resolved")]
    SkillNotFound(String),

    #[error("step '{step}' has invalid config: {message}")]
    InvalidConfig { step: String, message: String },

    /// Text-generation collaborator error, carried through unchanged.
    #[error("{0}")]
    Generation(String),

    #[error("step '{step}' timed out after {secs}s")]
    Timeout { step: String, secs: u64 },

    #[error("step '{step}' ran before its dependency '{dependency}' produced a result")]
    DependencyNotSatisfied { step: String, dependency: String },
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match &self {
            ServerError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ServerError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = ValidationError::CyclicDependency(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
    }

    #[test]
    fn test_validation_converts_into_server_error() {
        let err: ServerError = ValidationError::DuplicateStepId("s1".to_string()).into();
        assert!(matches!(err, ServerError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Invalid workflow definition: duplicate step id 's1'"
        );
    }
}
