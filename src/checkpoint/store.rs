//! In-memory checkpoint store: a bounded ring buffer per session, the
//! production default and the implementation exercised by tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::CheckpointError;
use crate::models::{Checkpoint, CheckpointMetadata, CheckpointReason, Session};

pub struct InMemoryCheckpointStore {
    capacity: usize,
    sessions: RwLock<HashMap<String, VecDeque<Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    /// `capacity` bounds how many checkpoints are retained per session
    /// (default 10, §4.5 "Ring buffer").
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl super::CheckpointStore for InMemoryCheckpointStore {
    async fn save(
        &self,
        session: &Session,
        source_node: &str,
        reason: CheckpointReason,
        description: Option<String>,
    ) -> Result<CheckpointMetadata, CheckpointError> {
        let metadata = CheckpointMetadata {
            id: Uuid::new_v4().to_string(),
            session_id: session.session_id.clone(),
            created_at: Utc::now(),
            source_node: source_node.to_string(),
            phase: session.phase,
            reason,
            description,
        };
        // Deep-copy the session so later mutation of the live session never
        // leaks into a stored snapshot (§4.5 "Deep-copy snapshots").
        let checkpoint = Checkpoint {
            metadata: metadata.clone(),
            snapshot: session.clone(),
        };

        let mut sessions = self.sessions.write().await;
        let ring = sessions.entry(session.session_id.clone()).or_default();
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(checkpoint);
        Ok(metadata)
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).and_then(|ring| ring.back().cloned()))
    }

    async fn list(&self, session_id: &str) -> Result<Vec<CheckpointMetadata>, CheckpointError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .map(|ring| ring.iter().map(|c| c.metadata.clone()).collect())
            .unwrap_or_default())
    }

    async fn by_id(&self, session_id: &str, id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .and_then(|ring| ring.iter().find(|c| c.metadata.id == id))
            .cloned())
    }

    async fn clear(&self, session_id: &str) -> Result<(), CheckpointError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointStore;
    use crate::models::CandidateDescriptor;

    fn sample_session(id: &str) -> Session {
        Session::new(
            id,
            "room1",
            CandidateDescriptor {
                id: "c1".into(),
                display_name: "Ada".into(),
            },
            "Project X",
            None,
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn ring_buffer_evicts_oldest_beyond_capacity() {
        let store = InMemoryCheckpointStore::new(2);
        let session = sample_session("s1");
        for _ in 0..3 {
            store
                .save(&session, "node", CheckpointReason::Periodic, None)
                .await
                .unwrap();
        }
        assert_eq!(store.list("s1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn load_latest_returns_most_recent_snapshot() {
        let store = InMemoryCheckpointStore::default();
        let mut session = sample_session("s1");
        store
            .save(&session, "node_a", CheckpointReason::PhaseTransition, None)
            .await
            .unwrap();
        session.error_count = 7;
        store
            .save(&session, "node_b", CheckpointReason::Manual, None)
            .await
            .unwrap();

        let latest = store.load_latest("s1").await.unwrap().unwrap();
        assert_eq!(latest.metadata.source_node, "node_b");
        assert_eq!(latest.snapshot.error_count, 7);
    }

    #[tokio::test]
    async fn unknown_session_has_no_checkpoints() {
        let store = InMemoryCheckpointStore::default();
        assert!(store.load_latest("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn by_id_finds_a_specific_checkpoint_not_just_the_latest() {
        let store = InMemoryCheckpointStore::default();
        let session = sample_session("s1");
        let first = store
            .save(&session, "node_a", CheckpointReason::PhaseTransition, None)
            .await
            .unwrap();
        store
            .save(&session, "node_b", CheckpointReason::Manual, None)
            .await
            .unwrap();

        let found = store.by_id("s1", &first.id).await.unwrap().unwrap();
        assert_eq!(found.metadata.source_node, "node_a");
        assert!(store.by_id("s1", "nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_drops_all_checkpoints_for_a_session() {
        let store = InMemoryCheckpointStore::default();
        let session = sample_session("s1");
        store
            .save(&session, "node", CheckpointReason::Periodic, None)
            .await
            .unwrap();

        store.clear("s1").await.unwrap();
        assert!(store.list("s1").await.unwrap().is_empty());
        assert!(store.load_latest("s1").await.unwrap().is_none());
    }
}
