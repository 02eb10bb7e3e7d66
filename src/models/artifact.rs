//! Parsed artifact representation and retrieval chunks (§3 "Artifact").

use serde::{Deserialize, Serialize};

/// One slide of the parsed presentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slide {
    pub number: u32,
    pub title: Option<String>,
    pub content: String,
    pub bullets: Vec<String>,
}

/// An artifact with its parsed slides. The embedding chunks derived from it
/// live in the retrieval index, not on this struct, since the index is the
/// authoritative owner of chunk storage (§3 "Ownership").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Artifact {
    pub source_uri: Option<String>,
    pub slides: Vec<Slide>,
}

/// A chunk as persisted by the retrieval index, including its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredChunk {
    pub chunk_index: u32,
    pub slide_number: u32,
    pub slide_title: Option<String>,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A chunk returned from `search`, carrying its similarity score rather than
/// the raw embedding vector (§4.1 contract).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub slide_number: u32,
    pub slide_title: Option<String>,
    pub text: String,
    pub similarity: f32,
}
