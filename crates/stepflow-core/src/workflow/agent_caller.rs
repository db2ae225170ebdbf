//! LLM-backed text generation for `prompt` steps.
//!
//! Calls the provider's HTTP API directly: the Anthropic Messages API
//! (also served by compatible gateways) or an OpenAI-style chat completions
//! endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;
use crate::workflow::collaborators::{extract_variables, Generation, TextGenerator};

const SYSTEM_PROMPT: &str = "You are a workflow step. Complete the goal using the provided \
    context from earlier steps. Answer with the result only.";

/// Token usage reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Calls an LLM provider over HTTP.
pub struct LlmGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl LlmGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    fn user_prompt(goal: &str, context: Option<&str>) -> String {
        match context {
            Some(ctx) if !ctx.trim().is_empty() => {
                format!("{}\n\n## Context from previous steps\n\n{}", goal, ctx)
            }
            _ => goal.to_string(),
        }
    }

    /// POST {base_url}/v1/messages
    async fn call_anthropic(&self, user_prompt: &str) -> Result<String, String> {
        let config = &self.config;
        let url = format!("{}/v1/messages", config.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": config.model,
            "max_tokens": config.max_tokens,
            "system": SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": user_prompt }]
        });
        if let Some(temp) = config.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        tracing::info!("[LlmGenerator] Calling Anthropic API: {} (model: {})", url, config.model);

        let json = self
            .post_json(
                self.client
                    .post(&url)
                    .header("x-api-key", &config.api_key)
                    .header("anthropic-version", "2023-06-01"),
                &body,
            )
            .await?;

        let text = json
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        log_usage(json.get("usage").map(|u| UsageInfo {
            input_tokens: u.get("input_tokens").and_then(|v| v.as_u64()),
            output_tokens: u.get("output_tokens").and_then(|v| v.as_u64()),
        }));
        Ok(text)
    }

    /// POST {base_url}/chat/completions
    async fn call_openai(&self, user_prompt: &str) -> Result<String, String> {
        let config = &self.config;
        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": config.model,
            "max_tokens": config.max_tokens,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt }
            ]
        });
        if let Some(temp) = config.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        tracing::info!("[LlmGenerator] Calling OpenAI-compatible API: {} (model: {})", url, config.model);

        let json = self
            .post_json(
                self.client
                    .post(&url)
                    .header("Authorization", format!("Bearer {}", config.api_key)),
                &body,
            )
            .await?;

        let text = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        log_usage(json.get("usage").map(|u| UsageInfo {
            input_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()),
            output_tokens: u.get("completion_tokens").and_then(|v| v.as_u64()),
        }));
        Ok(text)
    }

    async fn post_json(
        &self,
        request: reqwest::RequestBuilder,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        let response = request
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response body: {}", e))?;

        if !status.is_success() {
            return Err(format!("API returned {}: {}", status, response_text));
        }

        serde_json::from_str(&response_text)
            .map_err(|e| format!("Failed to parse response JSON: {}", e))
    }
}

fn log_usage(usage: Option<UsageInfo>) {
    if let Some(UsageInfo {
        input_tokens: Some(inp),
        output_tokens: Some(out),
    }) = usage
    {
        tracing::debug!("[LlmGenerator] Tokens: {} in / {} out", inp, out);
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, goal: &str, context: Option<&str>) -> Result<Generation, String> {
        if self.config.api_key.is_empty() {
            return Err(
                "No API key configured. Set ANTHROPIC_API_KEY (or OPENAI_API_KEY with \
                 STEPFLOW_LLM_ADAPTER=openai)."
                    .to_string(),
            );
        }

        let user_prompt = Self::user_prompt(goal, context);
        let text = match self.config.adapter.as_str() {
            "anthropic" | "claude" => self.call_anthropic(&user_prompt).await?,
            "openai" => self.call_openai(&user_prompt).await?,
            other => return Err(format!("Unknown generator adapter: '{}'", other)),
        };

        Ok(Generation {
            extracted_variables: extract_variables(&text),
            text,
        })
    }
}
