//! Channel-backed `Room` binding. In production this wraps a LiveKit (or
//! equivalent WebRTC SFU) client; here it exposes the same seam over plain
//! tokio channels so the rest of the pipeline never depends on a concrete
//! media SDK.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use super::room::{DataChannelMessage, Room};
use crate::error::ProviderError;

/// A room bound to a live connection's outbound audio sink and inbound
/// event broadcasts. Constructing one is the integration point where a real
/// SFU client's callbacks would be wired to `data_tx` / `disconnect_tx`.
pub struct ChannelRoom {
    room_id: String,
    audio_tx: mpsc::Sender<Vec<u8>>,
    data_tx: broadcast::Sender<DataChannelMessage>,
    disconnect_tx: broadcast::Sender<()>,
}

impl ChannelRoom {
    pub fn new(room_id: impl Into<String>, audio_tx: mpsc::Sender<Vec<u8>>) -> Self {
        let (data_tx, _) = broadcast::channel(64);
        let (disconnect_tx, _) = broadcast::channel(4);
        Self {
            room_id: room_id.into(),
            audio_tx,
            data_tx,
            disconnect_tx,
        }
    }

    /// Feeds an inbound data-channel message from the connection's event
    /// loop into every current subscriber.
    pub fn inject_data_channel_message(&self, message: DataChannelMessage) {
        let _ = self.data_tx.send(message);
    }

    /// Signals that the underlying connection dropped.
    pub fn inject_disconnect(&self) {
        let _ = self.disconnect_tx.send(());
    }
}

#[async_trait]
impl Room for ChannelRoom {
    async fn publish_audio(&self, pcm: Vec<u8>) -> Result<(), ProviderError> {
        debug!(room_id = %self.room_id, bytes = pcm.len(), "publishing audio frame");
        self.audio_tx
            .send(pcm)
            .await
            .map_err(|_| ProviderError::NonRetryable(format!("room {} audio sink closed", self.room_id)))
    }

    fn subscribe_data_channel(&self) -> broadcast::Receiver<DataChannelMessage> {
        self.data_tx.subscribe()
    }

    fn subscribe_disconnect(&self) -> broadcast::Receiver<()> {
        self.disconnect_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_audio_forwards_to_sink() {
        let (tx, mut rx) = mpsc::channel(1);
        let room = ChannelRoom::new("room1", tx);
        room.publish_audio(vec![1, 2, 3]).await.unwrap();
        assert_eq!(rx.recv().await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn disconnect_is_observed_by_subscriber() {
        let (tx, _rx) = mpsc::channel(1);
        let room = ChannelRoom::new("room1", tx);
        let mut sub = room.subscribe_disconnect();
        room.inject_disconnect();
        assert!(sub.recv().await.is_ok());
    }
}
