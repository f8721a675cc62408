use std::path::Path;

use localrag_core::error::{Error, Result};
use localrag_core::traits::CrossEncoder;
use localrag_embed::CandleCrossEncoder;

/// Cross-encoder run in-process. Scores are raw model logits.
pub struct LocalReranker {
	model: Box<dyn CrossEncoder>,
}

impl LocalReranker {
	pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
		Ok(Self::new(Box::new(CandleCrossEncoder::load(model_dir)?)))
	}

	pub fn new(model: Box<dyn CrossEncoder>) -> Self { Self { model } }

	pub(crate) fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
		let scores = self.model.score(query, passages).map_err(|e| Error::Rerank(format!("{e:#}")))?;
		if scores.len() != passages.len() {
			return Err(Error::Rerank(format!("cross-encoder returned {} scores for {} passages", scores.len(), passages.len())));
		}
		Ok(scores)
	}
}
