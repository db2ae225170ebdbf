//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the stepflow-core domain logic through `AppState`.

pub mod run;
pub mod server;
pub mod skills;
pub mod workflow;

use std::sync::Arc;

use console::style;
use stepflow_core::models::run::RunStatus;
use stepflow_core::state::{AppState, AppStateInner};
use stepflow_core::workflow::TemplateLoader;

/// Initialize a shared `AppState` from the given SQLite database path.
///
/// This mirrors `stepflow_server::create_app_state` without stale-run
/// reconciliation, which only the long-running server performs.
pub async fn init_state(db_path: &str, template_dir: Option<&str>) -> Result<AppState, String> {
    let db = stepflow_core::Database::open(db_path)
        .map_err(|e| format!("Failed to open database '{}': {}", db_path, e))?;

    let mut templates = TemplateLoader::new();
    if let Some(dir) = template_dir {
        templates.load_dir(dir)?;
    }

    let state: AppState = Arc::new(AppStateInner::new(db).with_templates(templates));

    // Discover skills from cwd
    let cwd = std::env::current_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| ".".to_string());
    state.skill_registry.reload(&cwd);

    Ok(state)
}

/// Pretty-print a serializable value as JSON to stdout.
pub fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Run status coloured for the terminal.
pub fn styled_status(status: RunStatus) -> String {
    let s = style(status.as_str());
    match status {
        RunStatus::Completed => s.green(),
        RunStatus::Failed => s.red(),
        RunStatus::Cancelled => s.yellow(),
        RunStatus::Pending | RunStatus::Running => s.cyan(),
    }
    .bold()
    .to_string()
}

/// Load .env and .env.local files for environment variables.
pub fn load_dotenv() {
    // .env.local first so it wins over .env
    for filename in &[".env.local", ".env"] {
        let path = std::path::Path::new(filename);
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        for (key, value) in parse_dotenv(&content) {
            // Existing env vars take priority
            if std::env::var(&key).is_err() {
                std::env::set_var(&key, &value);
            }
        }
        tracing::debug!("Loaded environment from '{}'", filename);
    }
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut vars = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, value)) = line.split_once('=') {
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            vars.push((key.trim().to_string(), value.to_string()));
        }
    }
    vars
}

/// Shorten `s` to at most `max` characters for table output.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv() {
        let vars = parse_dotenv(
            "# comment\n\nANTHROPIC_API_KEY=\"sk-test\"\nexport STEPFLOW_MODEL='m1'\nBROKEN\nEMPTY=\n",
        );
        assert_eq!(
            vars,
            vec![
                ("ANTHROPIC_API_KEY".to_string(), "sk-test".to_string()),
                ("STEPFLOW_MODEL".to_string(), "m1".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_styled_status_keeps_text() {
        assert!(styled_status(RunStatus::Failed).contains("failed"));
    }
}
