//! localrag-embed
//!
//! Embedding providers and the local cross-encoder. Providers form a closed
//! set selected by configuration; all of them implement
//! [`localrag_core::traits::Embedder`].

use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::info;

use localrag_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use localrag_core::traits::Embedder;

pub mod cross_encoder;
pub mod device;
pub mod hashing;
pub mod local;
pub mod pool;
pub mod remote;
pub mod tokenize;

pub use cross_encoder::CandleCrossEncoder;
pub use hashing::HashingEmbedder;
pub use local::{EmbeddingModel, resolve_model_dir};
pub use pool::masked_mean_l2;
pub use remote::OpenAiEmbedder;

pub enum EmbeddingProvider {
    Local(EmbeddingModel),
    OpenAi(OpenAiEmbedder),
    Hashing(HashingEmbedder),
}

impl EmbeddingProvider {
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        if use_fake_embeddings() {
            info!("APP_USE_FAKE_EMBEDDINGS set, using hashing embedder");
            return Ok(Self::Hashing(HashingEmbedder::new(settings.dim)));
        }
        match settings.provider {
            EmbeddingProviderKind::Local => {
                let dir = resolve_model_dir(settings.model_dir.as_deref(), "APP_MODEL_DIR", &settings.model)?;
                Ok(Self::Local(EmbeddingModel::load(&settings.model, &dir)?))
            }
            EmbeddingProviderKind::OpenAi => {
                let url = settings.url.as_deref().ok_or_else(|| anyhow!("embedding.url is required for the openai provider"))?;
                let timeout = settings.timeout_secs.map(Duration::from_secs);
                Ok(Self::OpenAi(OpenAiEmbedder::new(url, &settings.model, settings.api_key.clone(), settings.dim, timeout)?))
            }
            EmbeddingProviderKind::Hashing => Ok(Self::Hashing(HashingEmbedder::new(settings.dim))),
        }
    }

    fn inner(&self) -> &dyn Embedder {
        match self {
            Self::Local(e) => e,
            Self::OpenAi(e) => e,
            Self::Hashing(e) => e,
        }
    }
}

impl Embedder for EmbeddingProvider {
    fn model_id(&self) -> &str { self.inner().model_id() }
    fn dim(&self) -> usize { self.inner().dim() }
    fn embed(&self, text: &str) -> Result<Vec<f32>> { self.inner().embed(text) }
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { self.inner().embed_many(texts) }
}

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
