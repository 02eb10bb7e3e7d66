//! Checkpoint envelope (§3 "Checkpoint", §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::{Phase, Session};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    PhaseTransition,
    BeforeQuestion,
    AfterEvaluation,
    EmergencyPause,
    ConnectionLost,
    Periodic,
    Manual,
}

/// Metadata about a checkpoint, separate from the (potentially large)
/// snapshot payload so `list()` can return cheaply (§4.5 contract).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointMetadata {
    pub id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub source_node: String,
    pub phase: Phase,
    pub reason: CheckpointReason,
    pub description: Option<String>,
}

/// A full checkpoint: metadata plus a deep-copied snapshot of the session
/// state at the time it was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub metadata: CheckpointMetadata,
    pub snapshot: Session,
}
