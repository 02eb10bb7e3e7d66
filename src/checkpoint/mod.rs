//! The checkpoint store (component E): persists bounded history of session
//! snapshots so a crashed or disconnected session can resume (§4.5).

mod periodic;
mod store;

pub use periodic::spawn_periodic_checkpointing;
pub use store::InMemoryCheckpointStore;

use async_trait::async_trait;

use crate::error::CheckpointError;
use crate::models::{Checkpoint, CheckpointMetadata, CheckpointReason, Session};

/// Persists and retrieves session checkpoints. Implementations must treat
/// `save` as atomic per session: a concurrent `list`/`load_latest` never
/// observes a half-written checkpoint.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(
        &self,
        session: &Session,
        source_node: &str,
        reason: CheckpointReason,
        description: Option<String>,
    ) -> Result<CheckpointMetadata, CheckpointError>;

    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    async fn list(&self, session_id: &str) -> Result<Vec<CheckpointMetadata>, CheckpointError>;

    /// Looks up one checkpoint by its id, for resuming from a specific point
    /// in a session's history rather than always the latest (§4.5).
    async fn by_id(&self, session_id: &str, id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Drops every retained checkpoint for a session, e.g. once it reaches a
    /// terminal phase and its history no longer needs to be resumable.
    async fn clear(&self, session_id: &str) -> Result<(), CheckpointError>;
}
