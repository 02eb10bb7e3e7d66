//! Room abstraction (§4.4 expansion): the narrow surface the dialogue
//! pipeline needs from a real-time media room, independent of which vendor
//! backs it.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq)]
pub enum DataChannelMessage {
    Text(String),
    Binary(Vec<u8>),
}

/// A connected real-time room. Implementations publish synthesized audio and
/// surface candidate audio/data/disconnect events; they do not interpret the
/// events themselves, leaving that to the dialogue pipeline. Each call to
/// the subscribe methods returns an independent receiver so the pipeline can
/// resubscribe after a reconnect without re-establishing the room.
#[async_trait]
pub trait Room: Send + Sync {
    async fn publish_audio(&self, pcm: Vec<u8>) -> Result<(), ProviderError>;

    fn subscribe_data_channel(&self) -> broadcast::Receiver<DataChannelMessage>;

    fn subscribe_disconnect(&self) -> broadcast::Receiver<()>;
}
