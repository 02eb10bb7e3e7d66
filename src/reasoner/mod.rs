//! The reasoner (component C): four structured LLM tasks driving AI-content
//! detection, question generation, answer evaluation, and final reporting
//! (§4.3). Every task asks the LLM provider for JSON validated against a
//! schema generated from the corresponding model type with `schemars`, then
//! checked with `jsonschema` before it is trusted.

mod ai_detection;
mod evaluation;
mod json_utils;
mod questions;
mod report;

pub use ai_detection::detect_ai_content;
pub use evaluation::evaluate_answer;
pub use questions::generate_questions;
pub use report::generate_final_report;

use jsonschema::Validator;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::RetryConfig;
use crate::error::ProviderError;
use crate::orchestrator::circuit_breaker::CircuitBreaker;
use crate::orchestrator::retry::with_retry;
use crate::providers::{ChatMessage, ChatRequest, ChatRole, LlmProvider};

/// Builds the JSON Schema for `T` once and reuses it across calls; schema
/// generation is pure and pays off nothing to redo per request.
fn schema_value<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).expect("schemars output is always valid JSON")
}

/// Runs a structured-output chat task, validates the result against `T`'s
/// schema, and deserializes it. A schema violation is treated as a
/// non-retryable provider error: retrying an unconstrained prompt won't fix
/// a model that ignores instructions.
///
/// The call into `B` is wrapped in the retry/circuit-breaker layer of §4.8:
/// every reasoner task shares this chokepoint, so none of the four tasks
/// can accidentally skip it.
async fn run_structured_task<T: JsonSchema + DeserializeOwned>(
    llm: &dyn LlmProvider,
    model: &str,
    system_prompt: &str,
    user_prompt: &str,
    retry: &RetryConfig,
    breaker: &CircuitBreaker,
    operation: &str,
) -> Result<T, ProviderError> {
    let schema = schema_value::<T>();
    let request = ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: ChatRole::System,
                content: system_prompt.to_string(),
            },
            ChatMessage {
                role: ChatRole::User,
                content: user_prompt.to_string(),
            },
        ],
        temperature: Some(0.2),
    };

    let raw = breaker
        .call(operation, || {
            with_retry(retry, operation, || async { llm.structured_chat(&request, &schema).await })
        })
        .await?;
    let cleaned = json_utils::reparse_if_needed(raw);
    validate_against_schema(&schema, &cleaned)?;

    serde_json::from_value(cleaned).map_err(|e| ProviderError::NonRetryable(format!("schema-valid but undeserializable: {e}")))
}

fn validate_against_schema(schema: &Value, instance: &Value) -> Result<(), ProviderError> {
    let validator = Validator::new(schema).map_err(|e| ProviderError::NonRetryable(format!("invalid schema: {e}")))?;
    if let Err(first_error) = validator.validate(instance) {
        return Err(ProviderError::NonRetryable(format!(
            "model output failed schema validation: {first_error}"
        )));
    }
    Ok(())
}
