//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RERANKER__TOP_N=5`). Provides helpers
//! to expand `~` and `${VAR}` and to resolve relative paths against a known
//! base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Loads `path` plus its `<stem>.<env>.toml` sibling and the environment.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(path));
        let suffix = match env_name.as_str() {
            "dev" | "development" => Some("dev"),
            "prod" | "production" => Some("prod"),
            "test" | "testing" => Some("test"),
            _ => None,
        };
        if let Some(suffix) = suffix {
            figment = figment.merge(Toml::file(env_sibling(path, suffix)));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::new().merge(Toml::string(toml)) }
    }

    /// Extracts the whole document as [`Settings`]; absent keys take defaults.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

fn env_sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().map_or_else(|| "config".into(), |s| s.to_string_lossy().to_string());
    path.with_file_name(format!("{stem}.{suffix}.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache_dir: String,
    pub results_dir: String,
    pub documents: DocumentSettings,
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
    pub retrieval: RetrievalSettings,
    pub reranker: RerankerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: ".cache".into(),
            results_dir: ".results".into(),
            documents: DocumentSettings::default(),
            embedding: EmbeddingSettings::default(),
            chat: ChatSettings::default(),
            retrieval: RetrievalSettings::default(),
            reranker: RerankerSettings::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        let r = &self.retrieval;
        for (name, w) in [("retrieval.dense_weight", r.dense_weight), ("retrieval.bm25_weight", r.bm25_weight)] {
            if !(0.0..=1.0).contains(&w) {
                anyhow::bail!("{name} must be within [0, 1], got {w}");
            }
        }
        if r.embeddings_top_k == 0 || r.bm25_top_k == 0 {
            anyhow::bail!("retrieval top-k values must be at least 1");
        }
        if r.rrf_constant <= 0.0 {
            anyhow::bail!("retrieval.rrf_constant must be positive");
        }
        if self.reranker.top_n == 0 {
            anyhow::bail!("reranker.top_n must be at least 1");
        }
        if self.reranker.provider == RerankerProvider::Remote && self.reranker.url.is_none() {
            anyhow::bail!("reranker.url is required for the remote reranker");
        }
        if self.documents.chunk_overlap >= self.documents.chunk_size {
            anyhow::bail!("documents.chunk_overlap must be smaller than documents.chunk_size");
        }
        Ok(())
    }

    /// Rewrites relative `documents.folder`, `cache_dir` and `results_dir`
    /// so they resolve against `base` (the config file's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [&mut self.documents.folder, &mut self.cache_dir, &mut self.results_dir] {
            *path = resolve_with_base(base, path.as_str()).to_string_lossy().into_owned();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    pub folder: String,
    pub collection: String,
    /// Maximum chunk size in words.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self { folder: "./documents".into(), collection: "default".into(), chunk_size: 800, chunk_overlap: 80 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Local,
    OpenAi,
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model_dir: Option<String>,
    pub dim: usize,
    pub timeout_secs: Option<u64>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Local,
            model: "bge-m3".into(),
            url: None,
            api_key: None,
            model_dir: None,
            dim: 1024,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProviderKind {
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub provider: ChatProviderKind,
    pub model: String,
    pub url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    /// Sent only to backends with a native top-k sampler (Ollama).
    pub top_k: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            provider: ChatProviderKind::OpenAi,
            model: "gpt-4o-mini".into(),
            url: "https://api.openai.com/v1".into(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 1024,
            top_p: 0.95,
            top_k: Some(20),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub embeddings_top_k: usize,
    pub embeddings_score_threshold: Option<f32>,
    pub use_bm25: bool,
    pub bm25_top_k: usize,
    pub dense_weight: f32,
    pub bm25_weight: f32,
    pub rrf_constant: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            embeddings_top_k: 75,
            embeddings_score_threshold: None,
            use_bm25: false,
            bm25_top_k: 50,
            dense_weight: 0.25,
            bm25_weight: 0.75,
            rrf_constant: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankerProvider {
    None,
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerSettings {
    pub provider: RerankerProvider,
    pub model_dir: Option<String>,
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub top_n: usize,
    pub normalize_scores: bool,
    pub score_threshold: Option<f32>,
    pub timeout_secs: Option<u64>,
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            provider: RerankerProvider::None,
            model_dir: None,
            url: None,
            api_token: None,
            top_n: 10,
            normalize_scores: true,
            score_threshold: None,
            timeout_secs: None,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
