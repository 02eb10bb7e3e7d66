//! Cartesia-style HTTP streaming TTS (§4.2 "TTS"): a chunked-response
//! synthesis endpoint that streams raw PCM bytes as they render.

use futures_util::StreamExt;

use super::{TtsConfig, TtsProvider, TtsStream};
use crate::error::ProviderError;

pub struct CartesiaTts {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model_id: String,
}

impl CartesiaTts {
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: "https://api.cartesia.ai/tts/bytes".to_string(),
            model_id: model_id.into(),
        }
    }

    pub fn with_endpoint(api_key: impl Into<String>, model_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model_id: model_id.into(),
        }
    }

    fn classify(err: &reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(std::time::Duration::from_secs(30))
        } else if err.is_connect() || err.is_request() {
            ProviderError::RetryableTransient(err.to_string())
        } else {
            ProviderError::NonRetryable(err.to_string())
        }
    }
}

#[async_trait::async_trait]
impl TtsProvider for CartesiaTts {
    fn name(&self) -> &'static str {
        "cartesia"
    }

    async fn synthesize_stream(&self, text: &str, config: &TtsConfig) -> Result<TtsStream, ProviderError> {
        let body = serde_json::json!({
            "model_id": self.model_id,
            "transcript": text,
            "voice": { "mode": "id", "id": config.voice_id },
            "output_format": {
                "container": "raw",
                "encoding": "pcm_s16le",
                "sample_rate": config.sample_rate_hz,
            },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-Key", &self.api_key)
            .header("Cartesia-Version", "2024-11-13")
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::classify(&e))?;

        if !response.status().is_success() {
            let retryable = response.status().is_server_error() || response.status().as_u16() == 429;
            let message = format!("cartesia returned {}", response.status());
            return Err(if retryable {
                ProviderError::RetryableTransient(message)
            } else {
                ProviderError::NonRetryable(message)
            });
        }

        let byte_stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| Self::classify(&e)));

        Ok(Box::pin(byte_stream))
    }
}
