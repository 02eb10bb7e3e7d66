//! Layered error taxonomy. Each component surfaces a typed error; the
//! orchestrator composes them with `anyhow::Context` at the boundary, the
//! same split the source project draws between library errors and
//! CLI-level context.

use thiserror::Error;

/// Errors from retrieval ingestion (component A).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to parse artifact text: {0}")]
    Parse(String),
    #[error("failed to embed chunk {chunk_index}: {message}")]
    Embed { chunk_index: usize, message: String },
    #[error("failed to store chunks: {0}")]
    Store(String),
    #[error("artifact produced zero chunks")]
    Empty,
}

/// The three error kinds every provider adapter must distinguish (§4.2).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("retryable-transient: {0}")]
    RetryableTransient(String),
    #[error("non-retryable: {0}")]
    NonRetryable(String),
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error("circuit open for {operation}")]
    CircuitOpen { operation: String },
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::RetryableTransient(_) | ProviderError::Timeout(_))
    }
}

/// Errors raised while constructing or driving the workflow engine (component F).
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("node `{node}` returned unknown route `{route}`")]
    UnknownRoute { node: String, route: String },
    #[error("node `{0}` is not registered")]
    UnknownNode(String),
    #[error("question pool exhausted while routing")]
    PoolExhausted,
    #[error("unreachable state: {0}")]
    Unreachable(String),
}

/// Errors from the checkpoint store (component E).
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Top-level orchestrator error (component G), the type node functions and
/// the job-entry sequence return.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("session cancelled")]
    Cancelled,
    #[error("room disconnected: {0}")]
    RoomDisconnected(String),
}
