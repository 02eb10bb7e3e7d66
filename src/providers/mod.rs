//! Provider adapters for speech-to-text, text-to-speech, chat, and
//! embeddings (§4.2). Every adapter reports failures through
//! [`ProviderError`]'s three kinds so retry and circuit-breaking logic
//! (component H) never has to special-case a concrete vendor.

pub mod cartesia;
pub mod deepgram;
pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use crate::error::ProviderError;

/// One incremental speech-recognition result.
#[derive(Debug, Clone, PartialEq)]
pub struct AsrEvent {
    pub text: String,
    pub is_final: bool,
    /// True only at an utterance boundary (VAD endpoint), a stronger signal
    /// than `is_final` alone (grounded in the Deepgram `speech_final` vs.
    /// `is_final` distinction).
    pub speech_final: bool,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct AsrConfig {
    pub sample_rate_hz: u32,
    pub language: String,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            language: "en".to_string(),
        }
    }
}

pub type AsrStream = Pin<Box<dyn Stream<Item = Result<AsrEvent, ProviderError>> + Send>>;

/// Streaming speech recognition (§4.2 "ASR").
#[async_trait]
pub trait AsrProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Opens a streaming session; the returned channel accepts raw PCM
    /// frames and the returned stream yields transcription events.
    async fn start_stream(
        &self,
        config: &AsrConfig,
    ) -> Result<(tokio::sync::mpsc::Sender<Vec<u8>>, AsrStream), ProviderError>;
}

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub voice_id: String,
    pub sample_rate_hz: u32,
}

pub type TtsStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ProviderError>> + Send>>;

/// Streaming speech synthesis (§4.2 "TTS").
#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn synthesize_stream(&self, text: &str, config: &TtsConfig) -> Result<TtsStream, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Chat completion, plain and structured-output (§4.2 "LLM", §4.3).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, ProviderError>;

    /// Runs a chat completion constrained to return JSON matching
    /// `json_schema`, returning the parsed value (§4.3 "Structured output").
    async fn structured_chat(
        &self,
        request: &ChatRequest,
        json_schema: &Value,
    ) -> Result<Value, ProviderError>;
}

/// Text embeddings, shared by the retrieval index (§4.1) and reasoner.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}
