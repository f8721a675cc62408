//! Question files and the JSON result files written after a run.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use localrag_core::config::Settings;
use localrag_core::types::Chunk;
use localrag_hybrid::Answer;

const EXCERPT_CHARS: usize = 150;

#[derive(Debug, Deserialize)]
pub struct QuestionsFile {
	pub categories: BTreeMap<String, QuestionCategory>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionCategory {
	pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Question {
	pub question: String,
	#[serde(default)]
	pub reference_answer: Option<String>,
	#[serde(default)]
	pub weight: Option<f64>,
}

impl QuestionsFile {
	pub fn load(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
		serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
	}
}

#[derive(Debug, Serialize)]
pub struct SourceRecord {
	pub path: Option<String>,
	pub content: String,
	pub similarity_score: Option<f64>,
	pub reranker_score: Option<f64>,
}

impl From<&Chunk> for SourceRecord {
	fn from(chunk: &Chunk) -> Self {
		Self {
			path: chunk.source().map(str::to_string),
			content: chunk.content.clone(),
			similarity_score: chunk.similarity_score(),
			reranker_score: chunk.reranker_score(),
		}
	}
}

#[derive(Debug, Serialize)]
pub struct AnswerRecord {
	pub question: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reference_answer: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub weight: Option<f64>,
	pub answer: String,
	pub sources: Vec<SourceRecord>,
	pub retrieval_secs: f64,
	pub rerank_secs: f64,
	pub generation_secs: f64,
}

impl AnswerRecord {
	pub fn new(question: &Question, answer: &Answer) -> Self {
		Self {
			question: question.question.clone(),
			reference_answer: question.reference_answer.clone(),
			weight: question.weight,
			answer: answer.text.clone(),
			sources: answer.sources.iter().map(SourceRecord::from).collect(),
			retrieval_secs: answer.timings.retrieval.as_secs_f64(),
			rerank_secs: answer.timings.rerank.as_secs_f64(),
			generation_secs: answer.timings.generation.as_secs_f64(),
		}
	}
}

#[derive(Debug, Serialize)]
pub struct RunMetadata {
	pub timestamp: String,
	pub source_file: Option<String>,
	pub corpus_fingerprint: String,
	pub settings: Settings,
}

#[derive(Debug, Default, Serialize)]
pub struct CategoryResults {
	pub questions: Vec<AnswerRecord>,
}

#[derive(Debug, Serialize)]
pub struct EvaluationResults {
	pub metadata: RunMetadata,
	pub categories: BTreeMap<String, CategoryResults>,
}

#[derive(Debug, Serialize)]
pub struct InteractiveSession {
	pub metadata: RunMetadata,
	pub questions: Vec<AnswerRecord>,
}

pub fn timestamp() -> String { Local::now().format("%Y%m%d_%H%M%S").to_string() }

/// `<timestamp>_<stem>_evaluation_results_<model>.json` for question files,
/// `<timestamp>_interactive_session_<model>.json` otherwise.
pub fn result_path(results_dir: &Path, timestamp: &str, source_file: Option<&Path>, model: &str) -> PathBuf {
	let model = model.replace('/', "_");
	let name = match source_file.and_then(Path::file_stem) {
		Some(stem) => format!("{timestamp}_{}_evaluation_results_{model}.json", stem.to_string_lossy()),
		None => format!("{timestamp}_interactive_session_{model}.json"),
	};
	results_dir.join(name)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
	if let Some(dir) = path.parent() {
		fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
	}
	let body = serde_json::to_string_pretty(value)?;
	fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}

/// First characters of `content` with control characters escaped.
pub fn excerpt(content: &str) -> String {
	content.chars().take(EXCERPT_CHARS).collect::<String>().escape_debug().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn result_names_follow_run_kind() {
		let dir = Path::new(".results");
		let auto = result_path(dir, "20240101_120000", Some(Path::new("data/questions.json")), "BAAI/bge-m3");
		assert_eq!(auto, dir.join("20240101_120000_questions_evaluation_results_BAAI_bge-m3.json"));
		let interactive = result_path(dir, "20240101_120000", None, "bge-m3");
		assert_eq!(interactive, dir.join("20240101_120000_interactive_session_bge-m3.json"));
	}

	#[test]
	fn excerpt_is_bounded_and_escaped() {
		let long = "x".repeat(400);
		assert_eq!(excerpt(&long).len(), EXCERPT_CHARS);
		assert_eq!(excerpt("line one\nline two"), "line one\\nline two");
	}

	#[test]
	fn questions_file_parses_optional_fields() {
		let raw = r#"{"categories": {"animals": {"questions": [
			{"question": "Are cats mammals?", "reference_answer": "Yes", "weight": 2},
			{"question": "Do rocks live?"}
		]}}}"#;
		let parsed: QuestionsFile = serde_json::from_str(raw).unwrap();
		let qs = &parsed.categories["animals"].questions;
		assert_eq!(qs.len(), 2);
		assert_eq!(qs[0].weight, Some(2.0));
		assert!(qs[1].reference_answer.is_none());
	}

	#[test]
	fn write_json_creates_parent_dirs() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("nested/out.json");
		write_json(&path, &serde_json::json!({"ok": true})).unwrap();
		assert!(fs::read_to_string(&path).unwrap().contains("\"ok\": true"));
	}
}
