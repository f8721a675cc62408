//! OpenAI-compatible `/embeddings` endpoint.

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use localrag_core::traits::Embedder;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, dim: usize, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout { builder = builder.timeout(timeout); }
        let client = builder.build().context("building HTTP client")?;
        Ok(Self {
            client,
            url: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
            dim,
            id: format!("openai:{model}"),
        })
    }
}

impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_many(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedding service returned no vectors"))
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let mut request = self.client.post(&self.url).json(&EmbeddingRequest { model: &self.model, input: texts });
        if let Some(key) = &self.api_key { request = request.bearer_auth(key); }
        let response = request.send().with_context(|| format!("POST {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("embedding service returned {status}: {body}");
        }
        let parsed: EmbeddingResponse = response.json().context("decoding embedding response")?;
        if parsed.data.len() != texts.len() {
            bail!("embedding service returned {} vectors for {} inputs", parsed.data.len(), texts.len());
        }
        let mut out = vec![Vec::new(); texts.len()];
        for (pos, item) in parsed.data.into_iter().enumerate() {
            let slot = item.index.unwrap_or(pos);
            let target = out.get_mut(slot).ok_or_else(|| anyhow!("embedding index {slot} out of range"))?;
            if item.embedding.len() != self.dim {
                bail!("embedding dim {} != configured {}", item.embedding.len(), self.dim);
            }
            *target = item.embedding;
        }
        Ok(out)
    }
}
