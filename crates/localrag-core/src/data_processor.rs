//! Document loading and paragraph chunking.
//!
//! Walks a folder for `.txt`/`.md` files in sorted path order, splits each file
//! on blank lines and packs paragraphs into chunks of at most `max_words`
//! words. Paragraphs longer than the budget are split with `overlap_words` of
//! overlap. Chunk order is deterministic so the corpus fingerprint is stable
//! across runs on an unchanged folder.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{Chunk, CHUNK_INDEX_KEY};

const EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_words: usize,
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_words: 800, overlap_words: 80 }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Result<Self> {
        if chunking_config.max_words == 0 || chunking_config.overlap_words >= chunking_config.max_words {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunking_config.overlap_words, chunking_config.max_words
            )));
        }
        Ok(Self { chunking_config })
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> {
        if !data_dir.is_dir() {
            return Err(Error::NotFound(format!("documents folder {}", data_dir.display())));
        }
        let files = list_document_files(data_dir);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no documents found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            let content = read_file_content(file_path)?;
            let source = file_path.to_string_lossy().to_string();
            all_chunks.extend(self.chunk_content(&content, &source));
        }
        info!(files = files.len(), chunks = all_chunks.len(), "documents chunked");
        Ok(all_chunks)
    }

    /// Splits one document into chunks tagged with `source` and `chunk_index`.
    pub fn chunk_content(&self, content: &str, source: &str) -> Vec<Chunk> {
        let max = self.chunking_config.max_words;
        let mut pieces: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for paragraph in content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let words: Vec<&str> = paragraph.split_whitespace().collect();
            if words.len() > max {
                if !current.is_empty() {
                    pieces.push(current.join(" "));
                    current.clear();
                }
                pieces.extend(self.split_with_overlap(&words));
                continue;
            }
            if !current.is_empty() && current.len() + words.len() > max {
                pieces.push(current.join(" "));
                current.clear();
            }
            current.extend(words);
        }
        if !current.is_empty() {
            pieces.push(current.join(" "));
        }

        pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk::new(text, source).with_metadata(CHUNK_INDEX_KEY, i))
            .collect()
    }

    fn split_with_overlap(&self, words: &[&str]) -> Vec<String> {
        let max = self.chunking_config.max_words;
        let step = max - self.chunking_config.overlap_words;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + max).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start += step;
        }
        chunks
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn list_document_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().and_then(|s| s.to_str()).is_some_and(|ext| EXTENSIONS.contains(&ext)))
        .collect();
    files.sort();
    files
}
