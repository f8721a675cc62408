//! Local cross-encoder relevance model (bge-reranker family) on Candle.
//!
//! Scores are raw logits; callers decide whether to squash them to [0, 1].

use anyhow::Result;
use std::path::Path;
use tracing::info;

use candle_core::{DType, Device, Tensor};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaForSequenceClassification};
use tokenizers::Tokenizer;

use localrag_core::traits::CrossEncoder;

use crate::device::select_device;
use crate::local::{load_tokenizer, load_weights};
use crate::tokenize::tokenize_on_device;

const MAX_LEN: usize = 512;

pub struct CandleCrossEncoder {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
}

impl CandleCrossEncoder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading cross-encoder");
        let tokenizer = load_tokenizer(model_dir)?;
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(model_dir.join("config.json"))?)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(1, &config, vb)?;
        Ok(Self { model, tokenizer, device })
    }

    fn score_pair(&self, query: &str, passage: &str) -> Result<f32> {
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, (query, passage), MAX_LEN, &self.device)?;
        let token_type_ids = Tensor::zeros((1, MAX_LEN), DType::I64, &self.device)?;
        let logits = self.model.forward(&input_ids, &attention_mask, &token_type_ids)?;
        let values: Vec<f32> = logits.to_device(&Device::Cpu)?.flatten_all()?.to_dtype(DType::F32)?.to_vec1()?;
        values.first().copied().ok_or_else(|| anyhow::anyhow!("cross-encoder returned no logits"))
    }
}

impl CrossEncoder for CandleCrossEncoder {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        passages.iter().map(|p| self.score_pair(query, p)).collect()
    }
}
