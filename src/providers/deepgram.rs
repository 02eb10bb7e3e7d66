//! Deepgram streaming ASR over WebSocket (§4.2 "ASR"). Wire-format parsing
//! is grounded in Deepgram's `Results` message shape: `is_final` marks a
//! stable partial, `speech_final` marks a true utterance boundary (VAD
//! endpoint) and is the stronger signal this crate surfaces.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::tungstenite::Message;

use super::{AsrConfig, AsrEvent, AsrProvider, AsrStream};
use crate::error::ProviderError;

pub struct DeepgramAsr {
    api_key: String,
    endpoint: String,
}

impl DeepgramAsr {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: "wss://api.deepgram.com/v1/listen".to_string(),
        }
    }

    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    fn connect_url(&self, config: &AsrConfig) -> String {
        format!(
            "{}?encoding=linear16&sample_rate={}&language={}&interim_results=true",
            self.endpoint, config.sample_rate_hz, config.language
        )
    }
}

#[derive(Deserialize)]
struct DgWord {
    confidence: Option<f32>,
}

#[derive(Deserialize)]
struct DgAlternative {
    transcript: Option<String>,
    confidence: Option<f32>,
    words: Option<Vec<DgWord>>,
}

#[derive(Deserialize)]
struct DgChannel {
    alternatives: Option<Vec<DgAlternative>>,
}

#[derive(Deserialize)]
struct DgResult {
    #[serde(rename = "type")]
    result_type: Option<String>,
    channel: Option<DgChannel>,
    is_final: Option<bool>,
    speech_final: Option<bool>,
}

fn parse_event(text: &str) -> Option<AsrEvent> {
    let result: DgResult = serde_json::from_str(text).ok()?;
    if result.result_type.as_deref() != Some("Results") {
        return None;
    }
    let alt = result.channel?.alternatives?.into_iter().next()?;
    let transcript = alt.transcript.unwrap_or_default();
    if transcript.trim().is_empty() {
        return None;
    }
    let confidence = alt
        .confidence
        .or_else(|| alt.words.as_ref().and_then(|w| w.first()).and_then(|w| w.confidence))
        .unwrap_or(0.0);

    Some(AsrEvent {
        text: transcript,
        is_final: result.is_final.unwrap_or(false),
        speech_final: result.speech_final.unwrap_or(false),
        confidence,
    })
}

#[async_trait::async_trait]
impl AsrProvider for DeepgramAsr {
    fn name(&self) -> &'static str {
        "deepgram"
    }

    async fn start_stream(
        &self,
        config: &AsrConfig,
    ) -> Result<(mpsc::Sender<Vec<u8>>, AsrStream), ProviderError> {
        let url = self.connect_url(config);
        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .uri(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Host", "api.deepgram.com")
            .header("Sec-WebSocket-Key", tokio_tungstenite::tungstenite::handshake::client::generate_key())
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .body(())
            .map_err(|e| ProviderError::NonRetryable(e.to_string()))?;

        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ProviderError::RetryableTransient(e.to_string()))?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(64);
        tokio::spawn(async move {
            while let Some(chunk) = audio_rx.recv().await {
                if ws_tx.send(Message::Binary(chunk)).await.is_err() {
                    break;
                }
            }
            let _ = ws_tx.send(Message::Text("{\"type\": \"CloseStream\"}".to_string())).await;
        });

        let (event_tx, event_rx) = mpsc::channel::<Result<AsrEvent, ProviderError>>(64);
        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                let outcome = match frame {
                    Ok(Message::Text(text)) => parse_event(&text).map(Ok),
                    Ok(_) => None,
                    Err(e) => Some(Err(ProviderError::RetryableTransient(e.to_string()))),
                };
                if let Some(item) = outcome {
                    let is_err = item.is_err();
                    if event_tx.send(item).await.is_err() || is_err {
                        break;
                    }
                }
            }
        });

        Ok((audio_tx, Box::pin(ReceiverStream::new(event_rx))))
    }
}
