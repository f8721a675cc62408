//! Retrieval, optional reranking and generation for one question at a time.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use localrag_core::config::{expand_path, Settings};
use localrag_core::error::{Error, Result};
use localrag_core::traits::{Embedder, LanguageModel};
use localrag_core::types::Chunk;
use localrag_text::Bm25Retriever;
use localrag_vector::{CacheOutcome, DenseRetriever, VectorIndexCache};

use crate::fusion::EnsembleRetriever;
use crate::prompt::build_prompt;
use crate::rerank::{RerankOptions, Reranker};

/// Wall time of each stage of one [`RagPipeline::answer`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QueryTimings {
	pub retrieval: Duration,
	pub rerank: Duration,
	pub generation: Duration,
}

impl QueryTimings {
	pub fn total(&self) -> Duration { self.retrieval + self.rerank + self.generation }
}

#[derive(Debug, Clone)]
pub struct Answer {
	pub text: String,
	/// Chunks given to the model as context, best first.
	pub sources: Vec<Chunk>,
	pub timings: QueryTimings,
}

pub struct RagPipeline {
	retriever: EnsembleRetriever,
	reranker: Option<(Reranker, RerankOptions)>,
	llm: Arc<dyn LanguageModel>,
}

impl RagPipeline {
	pub fn new(retriever: EnsembleRetriever, llm: Arc<dyn LanguageModel>) -> Self {
		Self { retriever, reranker: None, llm }
	}

	#[must_use]
	pub fn with_reranker(mut self, reranker: Reranker, options: RerankOptions) -> Self {
		self.reranker = Some((reranker, options));
		self
	}

	/// Wires the dense retriever (through the index cache), the optional BM25
	/// retriever and the configured reranker over `chunks`.
	pub fn from_settings(settings: &Settings, chunks: Vec<Chunk>, embedder: Arc<dyn Embedder>, llm: Arc<dyn LanguageModel>) -> Result<(Self, CacheOutcome)> {
		let r = &settings.retrieval;
		let cache = VectorIndexCache::for_collection(&expand_path(&settings.cache_dir), &settings.documents.collection);
		let (store, outcome) = cache.get_or_build(embedder.model_id(), &chunks, embedder.as_ref())?;

		let mut ensemble = EnsembleRetriever::new(r.rrf_constant)?;
		let dense = DenseRetriever::new(store, embedder).with_score_threshold(r.embeddings_score_threshold);
		ensemble.push(Box::new(dense), r.dense_weight, r.embeddings_top_k)?;
		if r.use_bm25 {
			info!(top_k = r.bm25_top_k, "using BM25 retriever");
			ensemble.push(Box::new(Bm25Retriever::from_chunks(chunks)?), r.bm25_weight, r.bm25_top_k)?;
		}

		let mut pipeline = Self::new(ensemble, llm);
		if let Some(reranker) = Reranker::from_settings(&settings.reranker).map_err(|e| Error::InvalidConfig(format!("{e:#}")))? {
			pipeline = pipeline.with_reranker(reranker, RerankOptions::from(&settings.reranker));
		}
		Ok((pipeline, outcome))
	}

	pub fn answer(&self, query: &str) -> Result<Answer> {
		let mut timings = QueryTimings::default();

		let started = Instant::now();
		let fused = self.retriever.retrieve(query)?;
		timings.retrieval = started.elapsed();
		let mut sources: Vec<Chunk> = fused.into_iter().map(|f| f.chunk).collect();
		debug!(candidates = sources.len(), "fused candidates");

		if let Some((reranker, options)) = &self.reranker {
			let started = Instant::now();
			sources = reranker.rerank(sources, query, options)?;
			timings.rerank = started.elapsed();
		}

		let prompt = build_prompt(query, &sources);
		let started = Instant::now();
		let text = self.llm.generate(&prompt).map_err(|e| Error::Generation(format!("{e:#}")))?;
		timings.generation = started.elapsed();

		info!(
			sources = sources.len(),
			retrieval_ms = timings.retrieval.as_millis(),
			rerank_ms = timings.rerank.as_millis(),
			generation_ms = timings.generation.as_millis(),
			"answered"
		);
		Ok(Answer { text, sources, timings })
	}
}
