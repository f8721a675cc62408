use std::sync::Arc;
use tracing::debug;

use localrag_core::error::{Error, Result};
use localrag_core::traits::{Embedder, Retriever};
use localrag_core::types::{CandidateList, ScoredChunk, SourceKind, SIMILARITY_SCORE_KEY};

use crate::store::VectorStore;

/// Nearest-neighbour retriever over a [`VectorStore`]. Each returned chunk
/// carries `similarity_score` = 1 - cosine distance.
pub struct DenseRetriever {
	store: VectorStore,
	embedder: Arc<dyn Embedder>,
	score_threshold: Option<f32>,
}

impl DenseRetriever {
	pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>) -> Self {
		Self { store, embedder, score_threshold: None }
	}

	/// Drops results whose similarity is below `threshold`.
	#[must_use]
	pub fn with_score_threshold(mut self, threshold: Option<f32>) -> Self {
		self.score_threshold = threshold;
		self
	}
}

impl Retriever for DenseRetriever {
	fn retrieve(&self, query: &str, k: usize) -> Result<CandidateList> {
		if k == 0 { return Err(Error::InvalidArgument("k must be at least 1".into())); }
		let q = self.embedder.embed(query).map_err(|e| Error::Embedding(format!("{e:#}")))?;
		let hits = self.store.search(&q, k)?;
		debug!(k, hits = hits.len(), "dense search");
		Ok(hits
			.into_iter()
			.filter(|h| self.score_threshold.map_or(true, |t| h.similarity >= t))
			.map(|h| {
				let mut chunk = h.chunk;
				chunk.annotate_score(SIMILARITY_SCORE_KEY, h.similarity);
				ScoredChunk { chunk, score: h.similarity, source: SourceKind::Vector }
			})
			.collect())
	}
}
