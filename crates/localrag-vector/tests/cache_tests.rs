use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use localrag_core::error::Error;
use localrag_core::traits::{Embedder, Retriever};
use localrag_core::types::Chunk;
use localrag_embed::HashingEmbedder;
use localrag_vector::cache::STATE_FILE;
use localrag_vector::{CacheOutcome, DenseRetriever, VectorIndexCache};

struct CountingEmbedder {
	inner: HashingEmbedder,
	calls: AtomicUsize,
}

impl CountingEmbedder {
	fn new() -> Self { Self { inner: HashingEmbedder::new(64), calls: AtomicUsize::new(0) } }
	fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl Embedder for CountingEmbedder {
	fn model_id(&self) -> &str { self.inner.model_id() }
	fn dim(&self) -> usize { self.inner.dim() }
	fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.inner.embed(text)
	}
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
	fn model_id(&self) -> &str { "failing" }
	fn dim(&self) -> usize { 8 }
	fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> { anyhow::bail!("model unavailable") }
}

fn corpus() -> Vec<Chunk> {
	vec![
		Chunk::new("cats are mammals", "animals.txt"),
		Chunk::new("dogs are mammals", "animals.txt"),
		Chunk::new("rocks are not alive", "geology.txt"),
	]
}

#[test]
fn second_load_hits_without_embedding() {
	let tmp = tempfile::tempdir().unwrap();
	let cache = VectorIndexCache::for_collection(tmp.path(), "test");
	let embedder = CountingEmbedder::new();

	let (_, outcome) = cache.get_or_build(embedder.model_id(), &corpus(), &embedder).unwrap();
	assert!(matches!(outcome, CacheOutcome::Rebuilt { .. }));
	assert_eq!(embedder.calls(), 3);
	let state = cache.read_state(embedder.model_id()).unwrap();
	assert_eq!(state.chunks_hash, localrag_core::fingerprint(&corpus()));
	assert_eq!(state.embedding_model, embedder.model_id());

	let (store, outcome) = cache.get_or_build(embedder.model_id(), &corpus(), &embedder).unwrap();
	assert_eq!(outcome, CacheOutcome::Hit);
	assert_eq!(embedder.calls(), 3, "cache hit must not embed");
	assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn changed_corpus_rebuilds_once() {
	let tmp = tempfile::tempdir().unwrap();
	let cache = VectorIndexCache::new(tmp.path());
	let embedder = CountingEmbedder::new();
	cache.get_or_build(embedder.model_id(), &corpus(), &embedder).unwrap();

	let mut changed = corpus();
	changed.push(Chunk::new("birds lay eggs", "animals.txt"));
	let (store, outcome) = cache.get_or_build(embedder.model_id(), &changed, &embedder).unwrap();
	assert_eq!(outcome, CacheOutcome::Rebuilt { reason: "documents changed".into() });
	assert_eq!(embedder.calls(), 3 + 4);
	assert_eq!(store.count().unwrap(), 4);
	assert_eq!(cache.read_state(embedder.model_id()).unwrap().chunks_hash, localrag_core::fingerprint(&changed));

	let (_, outcome) = cache.get_or_build(embedder.model_id(), &changed, &embedder).unwrap();
	assert_eq!(outcome, CacheOutcome::Hit);
	assert_eq!(embedder.calls(), 7);
}

#[test]
fn failed_build_leaves_no_state() {
	let tmp = tempfile::tempdir().unwrap();
	let cache = VectorIndexCache::new(tmp.path());
	let err = cache.get_or_build("failing", &corpus(), &FailingEmbedder).err().unwrap();
	assert!(matches!(err, Error::IndexBuild(_)), "got {err:?}");
	assert!(!cache.index_dir("failing").join(STATE_FILE).exists());
	assert!(cache.read_state("failing").is_none());
}

#[test]
fn dense_retrieval_annotates_similarity() {
	let tmp = tempfile::tempdir().unwrap();
	let cache = VectorIndexCache::new(tmp.path());
	let embedder = Arc::new(CountingEmbedder::new());
	let (store, _) = cache.get_or_build(embedder.model_id(), &corpus(), embedder.as_ref()).unwrap();
	let retriever = DenseRetriever::new(store, embedder.clone());

	let hits = retriever.retrieve("cats are mammals", 2).unwrap();
	assert_eq!(hits.len(), 2);
	assert_eq!(hits[0].chunk.content, "cats are mammals");
	let top = hits[0].chunk.similarity_score().unwrap();
	assert!((top - 1.0).abs() < 1e-4, "identical text should have similarity 1, got {top}");
	assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
	assert_eq!(hits[0].chunk.source(), Some("animals.txt"));

	let all = retriever.retrieve("cats", 10).unwrap();
	assert_eq!(all.len(), 3, "k above corpus size returns every chunk");

	assert!(matches!(retriever.retrieve("cats", 0), Err(Error::InvalidArgument(_))));
}

#[test]
fn similarity_threshold_filters_results() {
	let tmp = tempfile::tempdir().unwrap();
	let cache = VectorIndexCache::new(tmp.path());
	let embedder = Arc::new(CountingEmbedder::new());
	let (store, _) = cache.get_or_build(embedder.model_id(), &corpus(), embedder.as_ref()).unwrap();
	let retriever = DenseRetriever::new(store, embedder).with_score_threshold(Some(0.99));

	let hits = retriever.retrieve("rocks are not alive", 3).unwrap();
	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].chunk.content, "rocks are not alive");
}
