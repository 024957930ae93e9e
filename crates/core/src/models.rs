//! # Casebrief Models
//!
//! Completion-service provider configuration and the radkit-backed client behind
//! [`CompletionService`]. Skills only see the trait; this module is the one place
//! that knows about providers.

use crate::skills::llm_helpers::{CompletionError, CompletionService};
use async_trait::async_trait;
use radkit::agent::LlmFunction;
use radkit::macros::LLMOutput;
use radkit::models::providers::{AnthropicLlm, OpenAILlm};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Supported completion providers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    /// OpenAI or any OpenAI-compatible chat-completions endpoint
    #[serde(rename = "openai")]
    OpenAI,
}

impl LlmProvider {
    /// Display name for logs and the CLI
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::OpenAI => "OpenAI",
        }
    }

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAI => "gpt-4o",
        }
    }

    /// Parse a provider name as accepted in configuration
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Some(LlmProvider::Anthropic),
            "openai" => Some(LlmProvider::OpenAI),
            _ => None,
        }
    }
}

/// Configuration for model selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_provider(LlmProvider::Anthropic, LlmProvider::Anthropic.default_model())
    }
}

impl ModelConfig {
    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// Set base URL (for OpenAI-compatible endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Create a completion client for the configured provider.
    ///
    /// radkit's providers read their key from the environment; `api_key` is the
    /// key already resolved from it, and an empty one fails every call up front.
    /// `timeout` is the per-call ceiling applied to every request.
    pub fn create_llm(&self, api_key: &str, timeout: Duration) -> anyhow::Result<Arc<dyn CompletionService>> {
        if !self.provider.supports_base_url() && self.base_url.is_some() {
            tracing::warn!(
                provider = self.provider.display_name(),
                "Base URL override is ignored for this provider"
            );
        }
        Ok(Arc::new(RadkitCompletion {
            config: self.clone(),
            has_key: !api_key.trim().is_empty(),
            timeout,
        }))
    }
}

/// Any JSON value. The expected shape travels in the system instructions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
#[serde(transparent)]
struct StructuredReply {
    value: Value,
}

/// Completion client over radkit's provider clients and `LlmFunction`
pub struct RadkitCompletion {
    config: ModelConfig,
    has_key: bool,
    timeout: Duration,
}

impl RadkitCompletion {
    async fn run(&self, system: &str, user: &str) -> Result<StructuredReply, CompletionError> {
        let config = &self.config;
        let result = match config.provider {
            LlmProvider::Anthropic => {
                let llm = AnthropicLlm::from_env(&config.model).map_err(|e| CompletionError::Service(e.to_string()))?;
                let func = LlmFunction::<StructuredReply>::new_with_system_instructions(llm, system);
                func.run(user.to_string()).await
            }
            LlmProvider::OpenAI => {
                let mut llm = OpenAILlm::from_env(&config.model).map_err(|e| CompletionError::Service(e.to_string()))?;
                if let Some(base_url) = &config.base_url {
                    llm = llm.with_base_url(base_url);
                }
                let func = LlmFunction::<StructuredReply>::new_with_system_instructions(llm, system);
                func.run(user.to_string()).await
            }
        };
        result.map_err(|e| classify_failure(e.to_string()))
    }
}

/// radkit reports undecodable model text and transport failures through one error type
fn classify_failure(message: String) -> CompletionError {
    let lower = message.to_ascii_lowercase();
    if ["json", "parse", "deserializ", "expected value"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        CompletionError::MalformedOutput(message)
    } else {
        CompletionError::Service(message)
    }
}

#[async_trait]
impl CompletionService for RadkitCompletion {
    async fn generate_structured(
        &self,
        system_instructions: &str,
        user_content: &str,
        max_output_tokens: u32,
    ) -> Result<Value, CompletionError> {
        let provider = self.config.provider.display_name();
        if !self.has_key {
            return Err(CompletionError::Service(format!("no API key configured for {}", provider)));
        }
        tracing::debug!(provider, model = %self.config.model, max_output_tokens, "Completion call");

        match tokio::time::timeout(self.timeout, self.run(system_instructions, user_content)).await {
            Ok(reply) => reply.map(|reply| reply.value),
            Err(_) => Err(CompletionError::Service(format!(
                "{} call timed out after {}s",
                provider,
                self.timeout.as_secs()
            ))),
        }
    }
}
