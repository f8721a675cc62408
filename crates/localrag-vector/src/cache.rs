//! Persisted vector index keyed by embedding model and corpus fingerprint.
//!
//! Layout under the collection root:
//!
//! ```text
//! vector_store_<model>/
//!   lance/              LanceDB dataset
//!   vector_state.json   {"embedding_model": .., "chunks_hash": ..}
//! ```
//!
//! The state record is written only after the dataset is fully persisted, so a
//! readable record always describes the dataset next to it.

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use localrag_core::error::{Error, Result};
use localrag_core::fingerprint;
use localrag_core::traits::Embedder;
use localrag_core::types::Chunk;

use crate::store::VectorStore;

pub const STATE_FILE: &str = "vector_state.json";
const DATASET_DIR: &str = "lance";
const STAGING_DIR: &str = "lance.staging";
const EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexState {
	pub embedding_model: String,
	pub chunks_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
	Hit,
	Rebuilt { reason: String },
}

pub struct VectorIndexCache {
	root: PathBuf,
}

impl VectorIndexCache {
	/// `root` is the per-collection directory, e.g. `<cache_dir>/<collection>`.
	pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

	pub fn for_collection(cache_dir: &Path, collection: &str) -> Self {
		Self::new(cache_dir.join(sanitize(collection)))
	}

	pub fn index_dir(&self, model_id: &str) -> PathBuf {
		self.root.join(format!("vector_store_{}", sanitize(model_id)))
	}

	pub fn read_state(&self, model_id: &str) -> Option<IndexState> {
		let path = self.index_dir(model_id).join(STATE_FILE);
		let raw = match fs::read_to_string(&path) {
			Ok(raw) => raw,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
			Err(e) => {
				warn!(path = %path.display(), error = %e, "cannot read index state record");
				return None;
			}
		};
		match serde_json::from_str(&raw) {
			Ok(state) => Some(state),
			Err(e) => {
				warn!(path = %path.display(), error = %e, "unreadable index state record");
				None
			}
		}
	}

	/// Opens the persisted index for (`model_id`, `chunks`) or rebuilds it.
	///
	/// A rebuild embeds every chunk once. Embedder or storage failures during a
	/// rebuild return [`Error::IndexBuild`] and leave no state record behind.
	pub fn get_or_build(&self, model_id: &str, chunks: &[Chunk], embedder: &dyn Embedder) -> Result<(VectorStore, CacheOutcome)> {
		let expected = IndexState { embedding_model: model_id.to_string(), chunks_hash: fingerprint(chunks) };
		let dir = self.index_dir(model_id);

		let reason = match self.read_state(model_id) {
			None => "no index state".to_string(),
			Some(state) if state != expected => {
				if state.embedding_model == expected.embedding_model { "documents changed".to_string() } else { "embedding model changed".to_string() }
			}
			Some(_) => match VectorStore::open(&dir.join(DATASET_DIR)) {
				Ok(store) if store.dim() == embedder.dim() => {
					info!(model = model_id, chunks_hash = %expected.chunks_hash, "loaded cached vector index");
					return Ok((store, CacheOutcome::Hit));
				}
				Ok(store) => format!("cached dimension {} differs from embedder dimension {}", store.dim(), embedder.dim()),
				Err(e) => {
					warn!(error = %e, "cached vector index failed to load");
					format!("load failure: {e}")
				}
			},
		};
		info!(model = model_id, chunks = chunks.len(), %reason, "building vector index");

		let store = self.rebuild(&dir, &expected, chunks, embedder)?;
		Ok((store, CacheOutcome::Rebuilt { reason }))
	}

	fn rebuild(&self, dir: &Path, state: &IndexState, chunks: &[Chunk], embedder: &dyn Embedder) -> Result<VectorStore> {
		fs::create_dir_all(dir).map_err(build_err)?;
		let state_path = dir.join(STATE_FILE);
		if state_path.exists() {
			fs::remove_file(&state_path).map_err(build_err)?;
		}

		let staging = dir.join(STAGING_DIR);
		remove_dir_if_exists(&staging).map_err(build_err)?;
		let built = embed_all(chunks, embedder).and_then(|vectors| VectorStore::build(&staging, chunks, &vectors, embedder.dim()));
		let staged = match built {
			Ok(store) => store,
			Err(e) => {
				let _ = remove_dir_if_exists(&staging);
				return Err(match e {
					Error::IndexBuild(_) => e,
					other => Error::IndexBuild(other.to_string()),
				});
			}
		};
		// Release the staging handle before moving the dataset.
		drop(staged);

		let dataset = dir.join(DATASET_DIR);
		remove_dir_if_exists(&dataset).map_err(build_err)?;
		fs::rename(&staging, &dataset).map_err(build_err)?;
		write_state(&state_path, state)?;

		VectorStore::open(&dataset).map_err(|e| Error::IndexBuild(e.to_string()))
	}
}

fn embed_all(chunks: &[Chunk], embedder: &dyn Embedder) -> Result<Vec<Vec<f32>>> {
	let pb = ProgressBar::new(chunks.len() as u64);
	if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} embedded") {
		pb.set_style(style.progress_chars("#>-"));
	}
	let mut vectors = Vec::with_capacity(chunks.len());
	for window in chunks.chunks(EMBED_BATCH) {
		let texts: Vec<String> = window.iter().map(|c| c.content.clone()).collect();
		let batch = embedder.embed_many(&texts).map_err(|e| Error::IndexBuild(format!("embedding failed: {e:#}")))?;
		if batch.len() != texts.len() {
			return Err(Error::IndexBuild(format!("embedder returned {} vectors for {} texts", batch.len(), texts.len())));
		}
		vectors.extend(batch);
		pb.inc(window.len() as u64);
	}
	pb.finish_and_clear();
	Ok(vectors)
}

fn write_state(path: &Path, state: &IndexState) -> Result<()> {
	let tmp = path.with_extension("json.tmp");
	let body = serde_json::to_vec_pretty(state).map_err(build_err)?;
	fs::write(&tmp, body).map_err(build_err)?;
	fs::rename(&tmp, path).map_err(build_err)
}

fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
	match fs::remove_dir_all(path) {
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		other => other,
	}
}

/// Keeps `[A-Za-z0-9._-]`, maps everything else to `_`.
pub fn sanitize(name: &str) -> String {
	name.chars().map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' }).collect()
}

fn build_err(e: impl std::fmt::Display) -> Error { Error::IndexBuild(e.to_string()) }
