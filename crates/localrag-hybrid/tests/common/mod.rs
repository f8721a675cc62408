#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use localrag_core::traits::{CrossEncoder, LanguageModel};
use localrag_core::types::Chunk;

pub fn corpus() -> Vec<Chunk> {
	vec![
		Chunk::new("cats are mammals", "animals.txt"),
		Chunk::new("dogs are mammals", "animals.txt"),
		Chunk::new("rocks are not alive", "geology.txt"),
	]
}

/// Records every prompt and answers with a fixed string.
#[derive(Default)]
pub struct RecordingModel {
	pub prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
	pub fn calls(&self) -> usize { self.prompts.lock().unwrap().len() }
	pub fn last_prompt(&self) -> Option<String> { self.prompts.lock().unwrap().last().cloned() }
}

impl LanguageModel for RecordingModel {
	fn generate(&self, prompt: &str) -> anyhow::Result<String> {
		self.prompts.lock().unwrap().push(prompt.to_string());
		Ok("recorded answer".into())
	}
}

/// Scores passages by how many query words they contain, as a logit around 0.
pub struct OverlapEncoder {
	pub calls: Arc<AtomicUsize>,
}

impl OverlapEncoder {
	pub fn new() -> Self { Self { calls: Arc::new(AtomicUsize::new(0)) } }
}

impl CrossEncoder for OverlapEncoder {
	fn score(&self, query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let words: Vec<String> = query.split_whitespace().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()).collect();
		Ok(passages
			.iter()
			.map(|p| {
				let p = p.to_lowercase();
				#[allow(clippy::cast_precision_loss)]
				let hits = words.iter().filter(|w| !w.is_empty() && p.split_whitespace().any(|t| t == w.as_str())).count() as f32;
				hits - 1.0
			})
			.collect())
	}
}

/// Serves `router` on an ephemeral port from a background thread and returns
/// its base URL.
pub fn spawn_server(router: Router) -> String {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	listener.set_nonblocking(true).unwrap();
	let addr = listener.local_addr().unwrap();
	std::thread::spawn(move || {
		let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
		rt.block_on(async move {
			let listener = tokio::net::TcpListener::from_std(listener).unwrap();
			axum::serve(listener, router).await.unwrap();
		});
	});
	format!("http://{addr}")
}

/// A URL nothing listens on.
pub fn closed_url() -> String {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);
	format!("http://{addr}/rerank")
}
