//! Domain types shared by the retrievers, the reranker and the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Chunk metadata. A sorted map so serialization is canonical.
pub type Metadata = BTreeMap<String, Value>;

pub const SOURCE_KEY: &str = "source";
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
pub const SIMILARITY_SCORE_KEY: &str = "similarity_score";
pub const RERANKER_SCORE_KEY: &str = "reranker_score";

/// A retrievable passage of a source document.
///
/// - `content`: the passage text, never modified after chunking
/// - `metadata`: at least `source` (origin document path); retrieval stages
///   annotate `similarity_score` and `reranker_score` in place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), Value::String(source.into()));
        Self { content: content.into(), metadata }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }

    pub fn similarity_score(&self) -> Option<f64> {
        self.metadata.get(SIMILARITY_SCORE_KEY).and_then(Value::as_f64)
    }

    pub fn reranker_score(&self) -> Option<f64> {
        self.metadata.get(RERANKER_SCORE_KEY).and_then(Value::as_f64)
    }

    /// Records a score under `key`. Non-finite scores are stored as JSON null.
    pub fn annotate_score(&mut self, key: &str, score: f32) {
        let value = serde_json::Number::from_f64(f64::from(score)).map_or(Value::Null, Value::Number);
        self.metadata.insert(key.to_string(), value);
    }

    /// Identity used when merging the same passage coming from several retrievers.
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            content: self.content.clone(),
            source: self.metadata.get(SOURCE_KEY).map(ToString::to_string),
        }
    }
}

/// Equality of (content, `source` metadata).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    content: String,
    source: Option<String>,
}

/// Indicates which engine produced a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// One entry of a candidate list. `score` is engine-specific but higher is
/// always better.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub source: SourceKind,
}

/// Ranked output of a single retriever, best first.
pub type CandidateList = Vec<ScoredChunk>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_scores_but_not_source() {
        let a = Chunk::new("cats are mammals", "a.txt");
        let mut b = a.clone();
        b.annotate_score(SIMILARITY_SCORE_KEY, 0.9);
        assert_eq!(a.key(), b.key());

        let c = Chunk::new("cats are mammals", "b.txt");
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn annotate_score_keeps_other_scores() {
        let mut chunk = Chunk::new("x", "x.txt");
        chunk.annotate_score(SIMILARITY_SCORE_KEY, 0.5);
        chunk.annotate_score(RERANKER_SCORE_KEY, 0.25);
        assert_eq!(chunk.similarity_score(), Some(0.5));
        assert_eq!(chunk.reranker_score(), Some(0.25));
        assert_eq!(chunk.source(), Some("x.txt"));
    }

    #[test]
    fn non_finite_score_becomes_null() {
        let mut chunk = Chunk::new("x", "x.txt");
        chunk.annotate_score(RERANKER_SCORE_KEY, f32::NAN);
        assert_eq!(chunk.metadata.get(RERANKER_SCORE_KEY), Some(&Value::Null));
        assert_eq!(chunk.reranker_score(), None);
    }
}
