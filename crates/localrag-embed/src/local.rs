//! BGE-M3 sentence embeddings computed locally with Candle.

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use localrag_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

const MAX_LEN: usize = 256;

pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    id: String,
}

impl EmbeddingModel {
    /// Loads `tokenizer.json`, `config.json` and the weights from `model_dir`.
    pub fn load(model_name: &str, model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(model = model_name, dir = %model_dir.display(), "loading embedding model");
        let tokenizer = load_tokenizer(model_dir)?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let dim = config.hidden_size;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        info!(model = model_name, dim, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, id: format!("local:{model_name}:d{dim}") })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, MAX_LEN, &self.device)?;
        let token_type_ids = Tensor::zeros((1, MAX_LEN), DType::I64, &self.device)?;
        let hidden_states = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let emb = masked_mean_l2(&hidden_states, &attention_mask)?;
        let emb_cpu: Vec<f32> = emb.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if emb_cpu.len() != self.dim {
            return Err(anyhow!("embedding dim {} != configured {}", emb_cpu.len(), self.dim));
        }
        if start.elapsed().as_millis() > 100 { debug!(elapsed_ms = start.elapsed().as_millis(), "slow embedding"); }
        Ok(emb_cpu)
    }
}

impl Embedder for EmbeddingModel {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed(&self, text: &str) -> Result<Vec<f32>> { self.embed_text(text) }
}

pub(crate) fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let tokenizer_path = model_dir.join("tokenizer.json");
    Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))
}

/// Prefers `model.safetensors`, falls back to `pytorch_model.bin`.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        // SAFETY: the weights file is not modified while the model is loaded.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? };
        return Ok(vb);
    }
    let weights_path = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&weights_path)?;
    let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}

/// Resolves a model directory: explicit setting, then `env_key`, then
/// `models/<name>` relative to the working directory or its parent.
pub fn resolve_model_dir(explicit: Option<&str>, env_key: &str, name: &str) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        let p = localrag_core::config::expand_path(dir);
        if p.exists() { return Ok(p); }
        warn!(dir = %p.display(), "configured model dir does not exist");
    }
    if let Ok(dir) = std::env::var(env_key) { let p = PathBuf::from(&dir); if p.exists() { return Ok(p); } }
    for candidate in [Path::new("models").join(name), Path::new("..").join("models").join(name)] {
        if candidate.exists() { return Ok(candidate); }
    }
    Err(anyhow!("Could not locate model directory for '{}' (set {} or the model_dir setting)", name, env_key))
}
