//! Production-default `RetrievalIndex` (§4.1 expansion): an in-process
//! chunk store keyed by session, grounded in the registry-of-state pattern
//! used for session storage elsewhere in this crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::chunker::{chunk_artifact, ChunkingConfig};
use super::Embedder;
use crate::error::IngestError;
use crate::models::{Artifact, RetrievedChunk, StoredChunk};

pub struct InMemoryRetrievalIndex {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    chunks: RwLock<HashMap<String, Vec<StoredChunk>>>,
}

impl InMemoryRetrievalIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunking: ChunkingConfig::default(),
            chunks: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_chunking(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            chunking,
            chunks: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl super::RetrievalIndex for InMemoryRetrievalIndex {
    #[instrument(skip(self, artifact), fields(session_id))]
    async fn ingest(&self, session_id: &str, artifact: &Artifact) -> Result<Vec<StoredChunk>, IngestError> {
        let packed = chunk_artifact(artifact, self.chunking);
        if packed.is_empty() {
            return Err(IngestError::Empty);
        }

        let texts: Vec<String> = packed.iter().map(|(_, _, text)| text.clone()).collect();
        let embeddings = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| IngestError::Embed {
                chunk_index: 0,
                message: e.to_string(),
            })?;
        if embeddings.len() != packed.len() {
            return Err(IngestError::Embed {
                chunk_index: embeddings.len(),
                message: "embedder returned a mismatched vector count".to_string(),
            });
        }

        let stored: Vec<StoredChunk> = packed
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, ((slide_number, slide_title, text), embedding))| StoredChunk {
                chunk_index: chunk_index as u32,
                slide_number,
                slide_title,
                text,
                embedding,
            })
            .collect();

        debug!(chunk_count = stored.len(), "ingested artifact into retrieval index");
        self.chunks
            .write()
            .await
            .insert(session_id.to_string(), stored.clone());
        Ok(stored)
    }

    async fn search(
        &self,
        session_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, IngestError> {
        let guard = self.chunks.read().await;
        let Some(stored) = guard.get(session_id) else {
            return Ok(fallback(&[], top_k));
        };
        if stored.is_empty() {
            return Ok(fallback(stored, top_k));
        }

        let query_embedding = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IngestError::Embed {
                chunk_index: 0,
                message: "embedder returned no vector for the query".to_string(),
            })?;

        let mut scored: Vec<RetrievedChunk> = stored
            .iter()
            .map(|chunk| RetrievedChunk {
                slide_number: chunk.slide_number,
                slide_title: chunk.slide_title.clone(),
                text: chunk.text.clone(),
                similarity: cosine_similarity(&query_embedding, &chunk.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k.max(1));
        if scored.is_empty() {
            Ok(fallback(stored, top_k))
        } else {
            Ok(scored)
        }
    }

    async fn chunk_count(&self, session_id: &str) -> usize {
        self.chunks
            .read()
            .await
            .get(session_id)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

/// Deterministic fallback when there is nothing meaningful to rank (§4.1
/// "Edge cases"): the first `top_k` chunks in storage order, or an empty
/// result when storage itself is empty.
fn fallback(stored: &[StoredChunk], top_k: usize) -> Vec<RetrievedChunk> {
    stored
        .iter()
        .take(top_k.max(1))
        .map(|chunk| RetrievedChunk {
            slide_number: chunk.slide_number,
            slide_title: chunk.slide_title.clone(),
            text: chunk.text.clone(),
            similarity: 0.0,
        })
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Slide;
    use crate::retrieval::RetrievalIndex;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0, 0.0])
                .collect())
        }
    }

    fn artifact() -> Artifact {
        Artifact {
            source_uri: None,
            slides: vec![Slide {
                number: 1,
                title: Some("Architecture".to_string()),
                content: "We used a microservice layout.".to_string(),
                bullets: vec![],
            }],
        }
    }

    #[tokio::test]
    async fn ingest_then_search_returns_ranked_chunk() {
        let index = InMemoryRetrievalIndex::new(Arc::new(StubEmbedder));
        index.ingest("s1", &artifact()).await.unwrap();
        let results = index.search("s1", "architecture", 3).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].slide_number, 1);
    }

    #[tokio::test]
    async fn search_on_unknown_session_falls_back_to_empty() {
        let index = InMemoryRetrievalIndex::new(Arc::new(StubEmbedder));
        let results = index.search("missing", "anything", 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn empty_artifact_is_rejected() {
        let index = InMemoryRetrievalIndex::new(Arc::new(StubEmbedder));
        let err = index.ingest("s1", &Artifact::default()).await.unwrap_err();
        assert!(matches!(err, IngestError::Empty));
    }
}
