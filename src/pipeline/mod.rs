//! The dialogue pipeline (component D): wires ASR, VAD, and TTS around a
//! room connection to produce turn-taking events for the workflow engine
//! (§4.4).

mod livekit;
mod room;
mod vad;

pub use livekit::ChannelRoom;
pub use room::{DataChannelMessage, Room};
pub use vad::{VadConfig, VadDetector, VadState};

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::providers::{AsrConfig, AsrProvider, TtsConfig, TtsProvider};

/// One event surfaced by the pipeline to the workflow engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A stable, utterance-complete transcription of candidate speech.
    CandidateUtterance(String),
    /// An interim transcription, not yet at an utterance boundary.
    PartialUtterance(String),
    CandidateStartedSpeaking,
    CandidateStoppedSpeaking,
    Disconnected,
    Reconnected,
}

/// Drives one room's audio/text loop: feeds microphone audio through ASR and
/// VAD, emits dialogue events, and renders AI utterances back through TTS.
#[async_trait]
pub trait DialoguePipeline: Send + Sync {
    async fn next_event(&mut self) -> Option<PipelineEvent>;

    /// Speaks `text` to the room and waits for playback to finish, so the
    /// workflow engine can rely on turn order (§4.4 "Turn-taking").
    async fn speak(&mut self, text: &str) -> Result<(), ProviderError>;
}

/// Production `DialoguePipeline`: candidate audio flows room -> ASR ->
/// event queue; AI speech flows TTS -> room. The room's own audio transport
/// is opaque here — `room` only publishes, while `asr_audio_tx` is the
/// microphone-side channel handed back by `AsrProvider::start_stream`.
pub struct LiveDialoguePipeline {
    room: Arc<dyn Room>,
    tts: Arc<dyn TtsProvider>,
    tts_config: TtsConfig,
    asr_audio_tx: mpsc::Sender<Vec<u8>>,
    events: mpsc::Receiver<PipelineEvent>,
}

impl LiveDialoguePipeline {
    pub async fn connect(
        room: Arc<dyn Room>,
        asr: Arc<dyn AsrProvider>,
        tts: Arc<dyn TtsProvider>,
        asr_config: AsrConfig,
        tts_config: TtsConfig,
    ) -> Result<Self, ProviderError> {
        let (asr_audio_tx, mut asr_stream) = asr.start_stream(&asr_config).await?;
        let (event_tx, event_rx) = mpsc::channel(64);

        let mut disconnects = room.subscribe_disconnect();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = asr_stream.next() => {
                        match event {
                            Some(Ok(asr_event)) => {
                                let mapped = if asr_event.speech_final {
                                    PipelineEvent::CandidateUtterance(asr_event.text)
                                } else {
                                    PipelineEvent::PartialUtterance(asr_event.text)
                                };
                                if event_tx.send(mapped).await.is_err() {
                                    break;
                                }
                            }
                            Some(Err(_)) | None => break,
                        }
                    }
                    disconnected = disconnects.recv() => {
                        if disconnected.is_ok() {
                            let _ = event_tx.send(PipelineEvent::Disconnected).await;
                        }
                        break;
                    }
                }
            }
        });

        Ok(Self {
            room,
            tts,
            tts_config,
            asr_audio_tx,
            events: event_rx,
        })
    }

    /// Lets tests and the microphone ingest path feed raw PCM into the ASR
    /// leg directly, without going through a `Room`.
    pub fn audio_sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.asr_audio_tx.clone()
    }
}

#[async_trait]
impl DialoguePipeline for LiveDialoguePipeline {
    async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    async fn speak(&mut self, text: &str) -> Result<(), ProviderError> {
        let mut stream = self.tts.synthesize_stream(text, &self.tts_config).await?;
        while let Some(chunk) = stream.next().await {
            self.room.publish_audio(chunk?).await?;
        }
        Ok(())
    }
}
