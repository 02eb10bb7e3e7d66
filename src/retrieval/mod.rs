//! Retrieval-augmented context: chunking, embedding, and similarity search
//! over a parsed artifact (§4.1).

mod chunker;
mod store;

pub use chunker::{chunk_artifact, ChunkingConfig};
pub use store::InMemoryRetrievalIndex;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IngestError;
use crate::models::{Artifact, RetrievedChunk, StoredChunk};
use crate::providers::EmbeddingProvider;

/// Anything capable of embedding text into vectors (the retrieval index
/// needs this both to ingest chunks and to embed a query at search time).
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError>;
}

/// Per-session chunk storage and similarity search (§4.1 contract).
///
/// Implementations own the chunk lifetime: `ingest` replaces whatever was
/// previously stored for a session, `search` never mutates state, and a
/// session with no stored chunks yields the deterministic fallback rather
/// than an error (§4.1 "Edge cases").
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    async fn ingest(&self, session_id: &str, artifact: &Artifact) -> Result<Vec<StoredChunk>, IngestError>;

    async fn search(
        &self,
        session_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, IngestError>;

    async fn chunk_count(&self, session_id: &str) -> usize;
}

/// Adapts any concrete [`EmbeddingProvider`] (component B) into the narrower
/// [`Embedder`] seam the retrieval index depends on, so the index never has
/// to know which vendor backs it.
pub struct ProviderEmbedder(pub Arc<dyn EmbeddingProvider>);

#[async_trait]
impl Embedder for ProviderEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        self.0.embed(texts).await.map_err(|e| IngestError::Embed {
            chunk_index: 0,
            message: e.to_string(),
        })
    }
}
