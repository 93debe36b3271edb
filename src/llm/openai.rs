//! OpenAI-compatible chat-completions client for Azure OpenAI and Ollama.
//!
//! - Azure: `POST {endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`
//!   with an `api-key` header.
//! - Ollama: `POST {base_url}/v1/chat/completions`, no auth.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{Completion, GatewayError, LlmGateway, LlmRequest};
use crate::cost::{CostTracker, UsageRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Azure,
    Ollama,
}

impl Provider {
    fn name(&self) -> &'static str {
        match self {
            Provider::Azure => "Azure OpenAI",
            Provider::Ollama => "Ollama",
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

pub struct OpenAiCompatClient {
    client: reqwest::Client,
    provider: Provider,
    url: String,
    /// Ollama's model list endpoint, used for connection checks.
    health_url: Option<String>,
    api_key: Option<String>,
    model: String,
    tracker: Option<Arc<CostTracker>>,
}

impl OpenAiCompatClient {
    pub fn azure(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            api_version
        );
        Ok(Self {
            client: build_client(timeout)?,
            provider: Provider::Azure,
            url,
            health_url: None,
            api_key: Some(api_key),
            model: deployment.to_string(),
            tracker: None,
        })
    }

    pub fn ollama(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let base = normalize_ollama_base(base_url);
        Ok(Self {
            client: build_client(timeout)?,
            provider: Provider::Ollama,
            url: format!("{base}/v1/chat/completions"),
            health_url: Some(format!("{base}/api/tags")),
            api_key: None,
            model: model.to_string(),
            tracker: None,
        })
    }

    /// Record Azure calls in the cost log. Ollama calls are free and never recorded.
    pub fn with_cost_tracker(mut self, tracker: Option<Arc<CostTracker>>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, request: &LlmRequest) -> Result<Completion, GatewayError> {
        let provider = self.provider.name();
        let body = ChatRequest {
            model: match self.provider {
                Provider::Ollama => Some(self.model.as_str()),
                Provider::Azure => None,
            },
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }

        let response = builder.send().await.map_err(|e| GatewayError::Transport {
            provider: provider.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                provider: provider.to_string(),
                status: status.as_u16(),
                body: crate::entry::truncate_chars(&text, 300),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| GatewayError::Transport {
            provider: provider.to_string(),
            message: format!("invalid response body: {e}"),
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GatewayError::EmptyResponse {
                provider: provider.to_string(),
            })?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(Completion {
            text,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }

    fn record_usage(&self, request: &LlmRequest, completion: &Completion, elapsed: Duration) -> f64 {
        let Some(tracker) = &self.tracker else {
            return 0.0;
        };
        let record = UsageRecord {
            operation: request.operation.clone(),
            model: self.model.clone(),
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
            elapsed_seconds: elapsed.as_secs_f64(),
            entry_date: request.entry_date,
            metadata: serde_json::json!({
                "temperature": request.temperature,
                "max_tokens": request.max_tokens,
                "prompt_length": request.user.len(),
                "response_length": completion.text.len(),
                "system_prompt_length": request.system.len(),
            }),
        };
        match tracker.record(&record) {
            Ok(cost) => cost,
            Err(e) => {
                warn!(operation = %request.operation, "failed to record LLM usage: {e:#}");
                0.0
            }
        }
    }
}

#[async_trait]
impl LlmGateway for OpenAiCompatClient {
    async fn generate(&self, request: &LlmRequest) -> Result<Completion, GatewayError> {
        let start = Instant::now();
        let completion = self.send(request).await?;
        let elapsed = start.elapsed();
        let cost = self.record_usage(request, &completion, elapsed);

        info!(
            operation = %request.operation,
            model = %self.model,
            prompt_tokens = completion.prompt_tokens,
            completion_tokens = completion.completion_tokens,
            elapsed_ms = elapsed.as_millis() as u64,
            cost_usd = cost,
            "LLM call complete"
        );
        Ok(completion)
    }

    async fn check_connection(&self) -> Result<(), GatewayError> {
        if let Some(url) = &self.health_url {
            let response =
                self.client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| GatewayError::Transport {
                        provider: self.provider.name().to_string(),
                        message: e.to_string(),
                    })?;
            if !response.status().is_success() {
                return Err(GatewayError::Status {
                    provider: self.provider.name().to_string(),
                    status: response.status().as_u16(),
                    body: String::new(),
                });
            }
            debug!(url = %url, "Ollama reachable");
            return Ok(());
        }

        let ping = LlmRequest::new("connection_check", "Reply with OK.", "ping")
            .temperature(0.0)
            .max_tokens(5);
        self.send(&ping).await.map(|_| ())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

/// Strip a trailing `/` and `/v1` so both `http://host:11434` and
/// `http://host:11434/v1/` work.
fn normalize_ollama_base(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    base.strip_suffix("/v1").unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_base_is_normalized() {
        assert_eq!(normalize_ollama_base("http://localhost:11434"), "http://localhost:11434");
        assert_eq!(normalize_ollama_base("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(normalize_ollama_base("http://localhost:11434/v1/"), "http://localhost:11434");
    }

    #[test]
    fn azure_url_includes_deployment_and_version() {
        let client = OpenAiCompatClient::azure(
            "https://example.openai.azure.com/",
            "gpt-4o",
            "2024-02-15-preview",
            "key".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
        assert_eq!(client.model(), "gpt-4o");
    }

    #[test]
    fn ollama_url_targets_v1_chat() {
        let client =
            OpenAiCompatClient::ollama("http://localhost:11434/v1", "llama3.1", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn chat_response_parses_usage() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{}"}}],"usage":{"prompt_tokens":12,"completion_tokens":3,"total_tokens":15},"model":"gpt-4o-2024"}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        let usage = parsed.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 3);
    }
}
