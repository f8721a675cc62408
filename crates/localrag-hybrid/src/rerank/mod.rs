//! Second-stage relevance scoring of fused candidates.
//!
//! Both variants produce one raw score per chunk and share [`select`]: stable
//! descending sort, keep `top_n`, drop anything below the threshold, then
//! annotate `reranker_score`.

mod local;
mod remote;

pub use local::LocalReranker;
pub use remote::RemoteReranker;

use std::time::Duration;
use tracing::{debug, info};

use localrag_core::config::{RerankerProvider, RerankerSettings};
use localrag_core::error::{Error, Result};
use localrag_core::types::{Chunk, RERANKER_SCORE_KEY};

#[derive(Debug, Clone, PartialEq)]
pub struct RerankOptions {
	pub top_n: usize,
	pub score_threshold: Option<f32>,
	/// Map raw local cross-encoder logits through the logistic function.
	pub normalize_scores: bool,
}

impl Default for RerankOptions {
	fn default() -> Self { Self { top_n: 10, score_threshold: None, normalize_scores: true } }
}

impl From<&RerankerSettings> for RerankOptions {
	fn from(s: &RerankerSettings) -> Self {
		Self { top_n: s.top_n, score_threshold: s.score_threshold, normalize_scores: s.normalize_scores }
	}
}

pub enum Reranker {
	Local(LocalReranker),
	Remote(RemoteReranker),
}

impl Reranker {
	/// `None` when reranking is disabled.
	pub fn from_settings(settings: &RerankerSettings) -> anyhow::Result<Option<Self>> {
		let timeout = settings.timeout_secs.map(Duration::from_secs);
		match settings.provider {
			RerankerProvider::None => Ok(None),
			RerankerProvider::Local => {
				let dir = localrag_embed::resolve_model_dir(settings.model_dir.as_deref(), "APP_RERANKER_MODEL_DIR", "bge-reranker-v2-m3")?;
				info!(model_dir = %dir.display(), "using local cross-encoder reranker");
				Ok(Some(Self::Local(LocalReranker::load(&dir)?)))
			}
			RerankerProvider::Remote => {
				let url = settings.url.as_deref().ok_or_else(|| anyhow::anyhow!("reranker.url is required for the remote reranker"))?;
				info!(url, "using remote reranker");
				Ok(Some(Self::Remote(RemoteReranker::new(url, settings.api_token.clone(), timeout)?)))
			}
		}
	}

	pub fn rerank(&self, chunks: Vec<Chunk>, query: &str, options: &RerankOptions) -> Result<Vec<Chunk>> {
		if chunks.is_empty() {
			return Ok(chunks);
		}
		let passages: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
		let scores = match self {
			Self::Local(r) => {
				let raw = r.score(query, &passages)?;
				if options.normalize_scores { raw.into_iter().map(sigmoid).collect() } else { raw }
			}
			Self::Remote(r) => r.score(query, &passages)?,
		};
		let before = chunks.len();
		let out = select(chunks, &scores, options)?;
		debug!(before, after = out.len(), "reranked");
		Ok(out)
	}
}

/// Orders `chunks` by `scores` (parallel slices), keeps the first `top_n`,
/// drops those below the threshold and records `reranker_score`.
pub fn select(chunks: Vec<Chunk>, scores: &[f32], options: &RerankOptions) -> Result<Vec<Chunk>> {
	if chunks.len() != scores.len() {
		return Err(Error::Rerank(format!("{} scores for {} chunks", scores.len(), chunks.len())));
	}
	let mut scored: Vec<(Chunk, f32)> = chunks.into_iter().zip(scores.iter().copied()).collect();
	// sort_by is stable, so equal scores keep input order.
	scored.sort_by(|a, b| b.1.total_cmp(&a.1));
	Ok(scored
		.into_iter()
		.take(options.top_n)
		.filter(|(_, score)| options.score_threshold.map_or(true, |t| *score >= t))
		.map(|(mut chunk, score)| {
			chunk.annotate_score(RERANKER_SCORE_KEY, score);
			chunk
		})
		.collect())
}

pub fn sigmoid(x: f32) -> f32 { 1.0 / (1.0 + (-x).exp()) }
