//! Optional text-generation collaborator
//!
//! Talks to the Anthropic Messages API. Never required: every call site
//! has a deterministic fallback, and a missing API key simply means no
//! client is constructed.
//!
//! Transient failures (429, 5xx, timeouts) are retried with exponential
//! backoff, jitter and a delay cap. Everything else fails fast.

use async_trait::async_trait;
use serde_json::json;
use std::future::Future;

use crate::config::{LlmConfig, RetryPolicy};
use crate::error::LlmError;

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Overrides the configured max tokens
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system: Option<String>,
}

/// Prompt in, text out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError>;

    /// For logs
    fn name(&self) -> &str;
}

/// Run `op` until it succeeds, fails terminally, or attempts run out
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let delay = policy.jittered(attempt, rand::random::<f64>());
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable LLM error: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if !config.has_credentials() {
            return Err(LlmError::MissingCredentials);
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// None when `ANTHROPIC_API_KEY` is unset or empty
    pub fn from_env() -> Option<Self> {
        match Self::new(LlmConfig::from_env()) {
            Ok(client) => {
                tracing::info!(model = %client.config.model, "Semantic reviewer enabled");
                Some(client)
            }
            Err(LlmError::MissingCredentials) => {
                tracing::debug!("No ANTHROPIC_API_KEY, semantic reviewer disabled");
                None
            }
            Err(e) => {
                tracing::warn!("Semantic reviewer unavailable: {}", e);
                None
            }
        }
    }

    async fn send_once(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
        let mut request_body = json!({
            "model": self.config.model,
            "max_tokens": options.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });
        if let Some(system) = &options.system {
            request_body["system"] = json!(system);
        }
        if let Some(temperature) = options.temperature {
            request_body["temperature"] = json!(temperature);
        }

        let api_response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = api_response.status();
        if !status.is_success() {
            let error_text = api_response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), error_text));
        }

        let response_json: serde_json::Value = api_response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        extract_text(&response_json)
    }
}

/// Concatenate the text blocks of a Messages API response
fn extract_text(response: &serde_json::Value) -> Result<String, LlmError> {
    let blocks = response["content"]
        .as_array()
        .ok_or_else(|| LlmError::Parse("response has no content array".to_string()))?;

    let text: String = blocks
        .iter()
        .filter(|b| b["type"].as_str().unwrap_or("text") == "text")
        .filter_map(|b| b["text"].as_str())
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(LlmError::Parse("response contained no text".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
        with_retry(&self.config.retry, |_| self.send_once(prompt, options)).await
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
