//! Engine and collaborator configuration, resolved from the environment.

use std::time::Duration;

const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;
const DEFAULT_STALE_RUN_SECS: u64 = 3600;

/// Tunables for the run coordinator and step executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound for a single suspending step (prompt generation, skill resolution).
    pub step_timeout_secs: u64,
    /// `running` records older than this are considered interrupted at startup.
    pub stale_run_after_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            stale_run_after_secs: DEFAULT_STALE_RUN_SECS,
        }
    }
}

impl EngineConfig {
    /// Read `STEPFLOW_STEP_TIMEOUT_SECS` and `STEPFLOW_STALE_RUN_SECS`,
    /// falling back to defaults for missing or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            step_timeout_secs: env_u64("STEPFLOW_STEP_TIMEOUT_SECS")
                .unwrap_or(defaults.step_timeout_secs),
            stale_run_after_secs: env_u64("STEPFLOW_STALE_RUN_SECS")
                .unwrap_or(defaults.stale_run_after_secs),
        }
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

/// Connection settings for the LLM-backed text generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Adapter type: "anthropic" or "openai"
    pub adapter: String,
    /// API base URL
    pub base_url: String,
    /// API key / auth token (may be empty; generation then fails per step)
    pub api_key: String,
    /// Model ID
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            adapter: "anthropic".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            temperature: None,
        }
    }
}

impl GeneratorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let adapter = std::env::var("STEPFLOW_LLM_ADAPTER").unwrap_or(defaults.adapter);

        let (base_url, api_key) = match adapter.as_str() {
            "openai" => (
                std::env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            ),
            _ => (
                std::env::var("ANTHROPIC_BASE_URL").unwrap_or(defaults.base_url),
                std::env::var("ANTHROPIC_AUTH_TOKEN")
                    .or_else(|_| std::env::var("ANTHROPIC_API_KEY"))
                    .unwrap_or_default(),
            ),
        };

        Self {
            adapter,
            base_url: resolve_env_vars(&base_url),
            api_key: resolve_env_vars(&api_key),
            model: std::env::var("STEPFLOW_MODEL")
                .map(|m| resolve_env_vars(&m))
                .unwrap_or(defaults.model),
            max_tokens: env_u64("STEPFLOW_MAX_TOKENS")
                .map(|v| v as u32)
                .unwrap_or(defaults.max_tokens),
            temperature: std::env::var("STEPFLOW_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}` syntax.
pub fn resolve_env_vars(input: &str) -> String {
    let re = match regex::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_expr = &caps[1];
        // Support default value syntax: ${VAR:-default}
        if let Some(idx) = var_expr.find(":-") {
            let var_name = &var_expr[..idx];
            let default_val = &var_expr[idx + 2..];
            std::env::var(var_name).unwrap_or_else(|_| default_val.to_string())
        } else {
            std::env::var(var_expr).unwrap_or_else(|_| format!("${{{}}}", var_expr))
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_STEPFLOW_VAR", "hello");
        assert_eq!(resolve_env_vars("${TEST_STEPFLOW_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix-${TEST_STEPFLOW_VAR}-suffix"),
            "prefix-hello-suffix"
        );
        assert_eq!(
            resolve_env_vars("${STEPFLOW_NONEXISTENT_VAR:-fallback}"),
            "fallback"
        );
        assert_eq!(
            resolve_env_vars("${STEPFLOW_NONEXISTENT_VAR}"),
            "${STEPFLOW_NONEXISTENT_VAR}"
        );
        std::env::remove_var("TEST_STEPFLOW_VAR");
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.step_timeout_secs, 300);
        assert_eq!(config.step_timeout(), Duration::from_secs(300));
        assert_eq!(config.stale_run_after_secs, 3600);
    }
}
