//! OpenAI-compatible LLM and embedding provider, built on `async-openai`
//! (grounded in the same crate's use for chat-completion streaming
//! elsewhere in this codebase's ancestry).

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    CreateChatCompletionStreamResponse, CreateEmbeddingRequestArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;

use super::{ChatMessage, ChatRequest, ChatRole, ChatStream, EmbeddingProvider, LlmProvider};
use crate::error::ProviderError;

pub struct OpenAiLlm {
    client: Client<OpenAIConfig>,
    embedding_model: String,
}

impl OpenAiLlm {
    pub fn new(api_key: &str, base_url: Option<&str>, embedding_model: impl Into<String>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = base_url {
            config = config.with_api_base(base_url);
        }
        Self {
            client: Client::with_config(config),
            embedding_model: embedding_model.into(),
        }
    }

    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            ChatRole::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            ChatRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            ChatRole::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(msg.content.clone())),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }
    }

    fn build_request(request: &ChatRequest, stream: bool, json_schema: Option<&Value>) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();
        let response_format = json_schema.map(|_| ResponseFormat::JsonObject);
        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            stream: if stream { Some(true) } else { None },
            response_format,
            ..Default::default()
        }
    }

    fn classify_error(err: async_openai::error::OpenAIError) -> ProviderError {
        match &err {
            async_openai::error::OpenAIError::Reqwest(e) if e.is_timeout() => {
                ProviderError::Timeout(std::time::Duration::from_secs(30))
            }
            async_openai::error::OpenAIError::ApiError(api_err) => {
                let retryable = api_err
                    .code
                    .as_deref()
                    .map(|c| c == "rate_limit_exceeded" || c == "server_error")
                    .unwrap_or(false);
                if retryable {
                    ProviderError::RetryableTransient(err.to_string())
                } else {
                    ProviderError::NonRetryable(err.to_string())
                }
            }
            _ => ProviderError::RetryableTransient(err.to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlm {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, ProviderError> {
        let openai_request = Self::build_request(request, true, None);
        let stream = self
            .client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(Self::classify_error)?;

        let mapped = stream.map(|result: Result<CreateChatCompletionStreamResponse, _>| match result {
            Ok(response) => Ok(response
                .choices
                .first()
                .and_then(|c| c.delta.content.clone())
                .unwrap_or_default()),
            Err(e) => Err(Self::classify_error(e)),
        });
        Ok(Box::pin(mapped))
    }

    async fn structured_chat(&self, request: &ChatRequest, json_schema: &Value) -> Result<Value, ProviderError> {
        let mut schema_request = request.clone();
        let instruction = format!(
            "Respond with a single JSON object matching this schema exactly, no prose: {json_schema}"
        );
        schema_request.messages.push(ChatMessage {
            role: ChatRole::System,
            content: instruction,
        });

        let openai_request = Self::build_request(&schema_request, false, Some(json_schema));
        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(Self::classify_error)?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ProviderError::NonRetryable("model returned no content".to_string()))?;

        serde_json::from_str(&content)
            .map_err(|e| ProviderError::NonRetryable(format!("invalid JSON from model: {e}")))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiLlm {
    fn name(&self) -> &'static str {
        "openai-embeddings"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(texts.to_vec())
            .build()
            .map_err(|e| ProviderError::NonRetryable(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(Self::classify_error)?;

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}
