//! # LLM Helpers
//!
//! The completion-service contract every skill depends on, plus typed helpers
//! shared across skills (schema-carrying instructions, decoding).

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Failure of a completion-service call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompletionError {
    /// The response could not be parsed into the expected structure
    #[error("malformed completion output: {0}")]
    MalformedOutput(String),
    /// Transport, authentication or provider-side failure
    #[error("completion service error: {0}")]
    Service(String),
}

/// A natural-language completion service returning structured (JSON) results.
///
/// Implementations must bound every call with a network timeout and report it as
/// [`CompletionError::Service`]. `max_output_tokens` is advisory; providers with
/// their own output limit may ignore it.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn generate_structured(
        &self,
        system_instructions: &str,
        user_content: &str,
        max_output_tokens: u32,
    ) -> Result<Value, CompletionError>;
}

/// Call the service and decode the result into `T`.
///
/// Decoding failures surface as [`CompletionError::MalformedOutput`].
pub async fn generate<T: DeserializeOwned>(
    service: &dyn CompletionService,
    system_instructions: &str,
    user_content: &str,
    max_output_tokens: u32,
) -> Result<T, CompletionError> {
    let value = service
        .generate_structured(system_instructions, user_content, max_output_tokens)
        .await?;
    serde_json::from_value(value).map_err(|e| CompletionError::MalformedOutput(e.to_string()))
}

/// Append the JSON Schema of `T` to a system prompt.
pub fn instructions_with_schema<T: JsonSchema>(base: &str) -> String {
    let schema = schemars::schema_for!(T);
    let rendered = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "{}\n\nRespond with a single JSON object matching this JSON Schema:\n{}",
        base.trim_end(),
        rendered
    )
}

/// Truncate to at most `max_chars` characters (not bytes)
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
