mod logging;
mod session;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use localrag_core::config::{expand_path, Config, Settings};
use localrag_core::data_processor::{ChunkingConfig, DataProcessor};
use localrag_core::fingerprint;
use localrag_core::traits::Embedder;
use localrag_core::types::Chunk;
use localrag_embed::EmbeddingProvider;
use localrag_hybrid::{Answer, ChatProvider, RagPipeline};
use localrag_vector::CacheOutcome;

use session::{AnswerRecord, CategoryResults, EvaluationResults, InteractiveSession, Question, QuestionsFile, RunMetadata};

/// Answer questions about a folder of text documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
	/// Configuration file; `<stem>.<RUST_ENV>.toml` and `APP_*` variables are layered on top
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Overrides `documents.folder`
	#[arg(short, long)]
	documents_folder: Option<String>,

	/// Raise log verbosity (-v debug, -vv trace)
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,

	/// Write logs to this file instead of stderr
	#[arg(long)]
	logfile: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Read questions from stdin until `exit`
	Interactive,
	/// Answer every question in a questions file and save the results
	Auto {
		#[arg(long, default_value = "questions.json")]
		questions_file: PathBuf,
	},
	/// Print the corpus fingerprint and chunk count
	Fingerprint,
}

fn main() {
	let cli = Cli::parse();
	if let Err(e) = logging::init(cli.verbose, cli.logfile.as_deref()) {
		eprintln!("Error: {e:#}");
		std::process::exit(1);
	}
	let started = Instant::now();
	let result = run(cli);
	println!("Execution time: {:.2} seconds", started.elapsed().as_secs_f64());
	if let Err(e) = result {
		eprintln!("Error: {e:#}");
		std::process::exit(1);
	}
}

fn run(cli: Cli) -> Result<()> {
	let mut settings = Config::load_from(&cli.config)?.settings()?;
	let config_dir = cli.config.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
	settings.resolve_paths(config_dir);
	if let Some(folder) = cli.documents_folder {
		settings.documents.folder = folder;
	}
	let chunks = load_chunks(&settings)?;

	if matches!(cli.command, Command::Fingerprint) {
		println!("{}  ({} chunks)", fingerprint(&chunks), chunks.len());
		return Ok(());
	}
	if chunks.is_empty() {
		warn!(folder = %settings.documents.folder, "no chunks to index, answers will have no context");
	}

	let corpus_fingerprint = fingerprint(&chunks);
	let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingProvider::from_settings(&settings.embedding)?);
	let llm = Arc::new(ChatProvider::from_settings(&settings.chat)?);
	let (pipeline, outcome) = RagPipeline::from_settings(&settings, chunks, embedder, llm)?;
	match &outcome {
		CacheOutcome::Hit => info!("vector index reused"),
		CacheOutcome::Rebuilt { reason } => info!(%reason, "vector index rebuilt"),
	}

	match cli.command {
		Command::Interactive => interactive(&pipeline, &settings, corpus_fingerprint),
		Command::Auto { questions_file } => auto(&pipeline, &settings, corpus_fingerprint, &questions_file),
		Command::Fingerprint => Ok(()),
	}
}

fn load_chunks(settings: &Settings) -> Result<Vec<Chunk>> {
	let folder = expand_path(&settings.documents.folder);
	if !folder.is_dir() {
		bail!("Documents folder {} does not exist or is not a directory (see --documents-folder)", folder.display());
	}
	let processor = DataProcessor::with_config(ChunkingConfig {
		max_words: settings.documents.chunk_size,
		overlap_words: settings.documents.chunk_overlap,
	})?;
	Ok(processor.process_directory(&folder)?)
}

fn metadata(settings: &Settings, corpus_fingerprint: String, source_file: Option<&Path>) -> RunMetadata {
	RunMetadata {
		timestamp: session::timestamp(),
		source_file: source_file.map(|p| p.display().to_string()),
		corpus_fingerprint,
		settings: settings.clone(),
	}
}

fn interactive(pipeline: &RagPipeline, settings: &Settings, corpus_fingerprint: String) -> Result<()> {
	let metadata = metadata(settings, corpus_fingerprint, None);
	let out_path = session::result_path(&expand_path(&settings.results_dir), &metadata.timestamp, None, &settings.embedding.model);
	let mut records = Vec::new();

	println!("\nReady to answer questions! Type 'exit' to quit.");
	let stdin = io::stdin();
	let mut lines = stdin.lock().lines();
	loop {
		print!("\nQuestion: ");
		io::stdout().flush()?;
		let Some(line) = lines.next() else { break };
		let line = line?;
		let question = line.trim();
		if question.eq_ignore_ascii_case("exit") { break; }
		if question.is_empty() { continue; }

		let answer = match pipeline.answer(question) {
			Ok(answer) => answer,
			Err(e) => {
				eprintln!("\nCould not answer: {e}");
				continue;
			}
		};
		print_answer(&answer);
		let asked = Question { question: question.to_string(), reference_answer: None, weight: None };
		records.push(AnswerRecord::new(&asked, &answer));
	}

	session::write_json(&out_path, &InteractiveSession { metadata, questions: records })?;
	println!("\nInteractive session saved to: {}", out_path.display());
	Ok(())
}

fn auto(pipeline: &RagPipeline, settings: &Settings, corpus_fingerprint: String, questions_file: &Path) -> Result<()> {
	let questions = QuestionsFile::load(questions_file)?;
	let metadata = metadata(settings, corpus_fingerprint, Some(questions_file));
	let out_path = session::result_path(&expand_path(&settings.results_dir), &metadata.timestamp, Some(questions_file), &settings.embedding.model);

	let mut results = EvaluationResults { metadata, categories: BTreeMap::new() };
	if let Err(e) = answer_all(pipeline, &questions, &mut results) {
		let answered: usize = results.categories.values().map(|c| c.questions.len()).sum();
		warn!(answered, "evaluation aborted, saving partial results");
		session::write_json(&out_path, &results)?;
		println!("\nPartial evaluation results saved to: {}", out_path.display());
		return Err(e);
	}

	session::write_json(&out_path, &results)?;
	println!("\nEvaluation results saved to: {}", out_path.display());
	Ok(())
}

// Answers land in `results` as they complete so a failure keeps earlier ones.
fn answer_all(pipeline: &RagPipeline, questions: &QuestionsFile, results: &mut EvaluationResults) -> Result<()> {
	for (name, category) in &questions.categories {
		println!("\nProcessing category: {name}");
		let entry: &mut CategoryResults = results.categories.entry(name.clone()).or_default();
		for question in &category.questions {
			println!("\nProcessing question: {}", question.question);
			let answer = pipeline.answer(&question.question).with_context(|| format!("answering {:?}", question.question))?;
			entry.questions.push(AnswerRecord::new(question, &answer));
		}
	}
	Ok(())
}

fn print_answer(answer: &Answer) {
	println!("\nAI's Answer: {}", answer.text);
	println!("\nSources:");
	println!("    {}", "-".repeat(50));
	for (i, chunk) in answer.sources.iter().enumerate() {
		println!("--- Document {} ---", i + 1);
		println!("    Path: {}", chunk.source().unwrap_or("N/A"));
		println!("    Excerpt: {}...", session::excerpt(&chunk.content));
		println!("    Similarity score: {}", score_or_na(chunk.similarity_score()));
		println!("    Relevance score: {}\n", score_or_na(chunk.reranker_score()));
	}
}

fn score_or_na(score: Option<f64>) -> String {
	score.map_or_else(|| "N/A".to_string(), |s| format!("{s:.4}"))
}
