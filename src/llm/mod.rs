//! LLM gateway.
//!
//! Every model call goes through the [`LlmGateway`] trait: a system prompt, a user
//! prompt, a temperature and a token budget in, free text out. Callers treat the
//! text as untrusted and parse it with [`json::parse_json_lenient`]. Results that
//! depend on the model are reported as an [`LlmOutcome`] so that a gateway problem
//! degrades to an empty result instead of failing the command.

pub mod json;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{BrainConfig, LlmSettings};
use crate::cost::CostTracker;

/// One chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// Label recorded in the cost log, e.g. `semantic_backlinks`.
    pub operation: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub entry_date: Option<NaiveDate>,
}

impl LlmRequest {
    pub fn new(
        operation: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            system: system.into(),
            user: user.into(),
            temperature: 0.7,
            max_tokens: 500,
            entry_date: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn entry_date(mut self, date: NaiveDate) -> Self {
        self.entry_date = Some(date);
        self
    }
}

/// Raw model output plus usage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to {provider} failed: {message}")]
    Transport { provider: String, message: String },
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("{provider} returned no message content")]
    EmptyResponse { provider: String },
    #[error("LLM unavailable: {0}")]
    Unavailable(String),
}

/// Why an LLM-dependent result could not be produced.
#[derive(Debug, Error)]
pub enum LlmFailure {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("malformed LLM output: {0}")]
    Malformed(String),
}

/// Result of an LLM-dependent step.
#[derive(Debug)]
pub enum LlmOutcome<T> {
    Parsed(T),
    /// No call was made, e.g. the entry is too short or there is nothing to compare.
    Skipped(String),
    Failed(LlmFailure),
}

impl<T> LlmOutcome<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, LlmOutcome::Parsed(_))
    }

    pub fn failure(&self) -> Option<&LlmFailure> {
        match self {
            LlmOutcome::Failed(f) => Some(f),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LlmOutcome<U> {
        match self {
            LlmOutcome::Parsed(v) => LlmOutcome::Parsed(f(v)),
            LlmOutcome::Skipped(reason) => LlmOutcome::Skipped(reason),
            LlmOutcome::Failed(e) => LlmOutcome::Failed(e),
        }
    }
}

impl<T: Default> LlmOutcome<T> {
    /// The parsed value, or the empty result for skipped and failed steps.
    pub fn into_value(self) -> T {
        match self {
            LlmOutcome::Parsed(v) => v,
            _ => T::default(),
        }
    }
}

impl<T> From<Result<T, LlmFailure>> for LlmOutcome<T> {
    fn from(result: Result<T, LlmFailure>) -> Self {
        match result {
            Ok(v) => LlmOutcome::Parsed(v),
            Err(e) => LlmOutcome::Failed(e),
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn generate(&self, request: &LlmRequest) -> Result<Completion, GatewayError>;

    /// Cheap reachability check used before batch commands and by `doctor`.
    async fn check_connection(&self) -> Result<(), GatewayError>;

    /// Model or deployment name, for display and cost records.
    fn model(&self) -> &str;
}

/// Generate and parse the reply as JSON.
pub async fn ask_json<T: DeserializeOwned>(
    gateway: &dyn LlmGateway,
    request: &LlmRequest,
) -> Result<T, LlmFailure> {
    let completion = gateway.generate(request).await?;
    json::parse_json_lenient(&completion.text)
}

/// Build the configured provider. Fails on missing credentials.
pub fn create_gateway(
    config: &BrainConfig,
    tracker: Option<Arc<CostTracker>>,
) -> Result<Box<dyn LlmGateway>> {
    let settings = config.llm_settings()?;
    let timeout = std::time::Duration::from_secs(config.llm.timeout_secs);
    let client = match settings {
        LlmSettings::Azure {
            api_key,
            endpoint,
            deployment,
            api_version,
        } => openai::OpenAiCompatClient::azure(
            &endpoint,
            &deployment,
            &api_version,
            api_key,
            timeout,
        )?
        .with_cost_tracker(tracker),
        LlmSettings::Ollama { base_url, model } => {
            openai::OpenAiCompatClient::ollama(&base_url, &model, timeout)?
        }
    };
    Ok(Box::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_value_defaults_for_skipped_and_failed() {
        let parsed: LlmOutcome<Vec<u8>> = LlmOutcome::Parsed(vec![1]);
        assert_eq!(parsed.into_value(), vec![1]);

        let skipped: LlmOutcome<Vec<u8>> = LlmOutcome::Skipped("too short".into());
        assert!(skipped.into_value().is_empty());

        let failed: LlmOutcome<Vec<u8>> =
            LlmOutcome::Failed(LlmFailure::Malformed("not json".into()));
        assert!(failed.failure().is_some());
        assert!(failed.into_value().is_empty());
    }

    #[test]
    fn request_builder_sets_fields() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
        let req = LlmRequest::new("op", "sys", "user")
            .temperature(0.2)
            .max_tokens(250)
            .entry_date(date);
        assert_eq!(req.temperature, 0.2);
        assert_eq!(req.max_tokens, 250);
        assert_eq!(req.entry_date, Some(date));
    }

    #[test]
    fn gateway_error_wraps_into_failure() {
        let failure: LlmFailure = GatewayError::Unavailable("offline".into()).into();
        assert_eq!(failure.to_string(), "LLM unavailable: offline");
    }
}
