//! Seams between the core and its collaborators.

use crate::error::Result;
use crate::types::CandidateList;

/// Text embedding model. Output must be deterministic for identical input
/// and `model_id`.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the provider and model, used as a cache key.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
    fn embed_many(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Text generation backend.
pub trait LanguageModel: Send + Sync {
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Joint (query, passage) relevance model.
pub trait CrossEncoder: Send + Sync {
    /// One raw score per passage, in input order.
    fn score(&self, query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>>;
}

/// A single ranked source of candidates.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, query: &str, k: usize) -> Result<CandidateList>;
}
