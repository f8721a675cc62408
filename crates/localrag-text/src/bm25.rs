//! In-memory BM25 retriever over a fixed chunk snapshot.

use std::collections::BTreeSet;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use localrag_core::error::{Error, Result};
use localrag_core::traits::Retriever;
use localrag_core::types::{CandidateList, Chunk, ScoredChunk, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer, ChunkFields};

const WRITER_MEMORY_BYTES: usize = 50_000_000;

pub struct Bm25Retriever {
	index: Index,
	reader: IndexReader,
	fields: ChunkFields,
	chunks: Vec<Chunk>,
}

impl Bm25Retriever {
	/// Indexes `chunks` once. Later changes to the corpus require a new retriever.
	pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self> {
		let (schema, fields) = build_schema();
		let index = Index::create_in_ram(schema);
		register_tokenizer(&index);
		// One thread keeps a single segment, so doc ids follow insertion order.
		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES).map_err(search_err)?;
		for (ordinal, chunk) in chunks.iter().enumerate() {
			writer.add_document(doc!(
				fields.ordinal => ordinal as u64,
				fields.text => chunk.content.clone(),
			)).map_err(search_err)?;
		}
		writer.commit().map_err(search_err)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(search_err)?;
		info!(chunks = chunks.len(), "bm25 index built");
		Ok(Self { index, reader, fields, chunks })
	}

	pub fn len(&self) -> usize { self.chunks.len() }

	pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

	fn query_terms(&self, query: &str) -> Result<Vec<String>> {
		let mut analyzer = self.index.tokenizer_for_field(self.fields.text).map_err(search_err)?;
		let mut terms = BTreeSet::new();
		let mut stream = analyzer.token_stream(query);
		stream.process(&mut |token| { terms.insert(token.text.clone()); });
		Ok(terms.into_iter().collect())
	}
}

impl Retriever for Bm25Retriever {
	fn retrieve(&self, query: &str, k: usize) -> Result<CandidateList> {
		if k == 0 { return Err(Error::InvalidArgument("k must be at least 1".into())); }
		let terms = self.query_terms(query)?;
		if terms.is_empty() || self.chunks.is_empty() {
			debug!(query, "bm25 query has no searchable terms");
			return Ok(Vec::new());
		}
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.fields.text, t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		let query_obj = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query_obj, &TopDocs::with_limit(k)).map_err(search_err)?;
		let mut hits: Vec<(usize, f32)> = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(search_err)?;
			let ordinal = doc.get_first(self.fields.ordinal).and_then(|v| v.as_u64())
				.ok_or_else(|| Error::Search("indexed chunk without ordinal".into()))?;
			hits.push((usize::try_from(ordinal).map_err(|e| Error::Search(e.to_string()))?, score));
		}
		hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

		hits.into_iter()
			.map(|(ordinal, score)| {
				let chunk = self.chunks.get(ordinal).cloned()
					.ok_or_else(|| Error::Search(format!("ordinal {ordinal} outside corpus")))?;
				Ok(ScoredChunk { chunk, score, source: SourceKind::Text })
			})
			.collect()
	}
}

fn search_err(e: impl std::fmt::Display) -> Error { Error::Search(e.to_string()) }

#[cfg(test)]
mod tests {
	use super::*;

	fn corpus() -> Vec<Chunk> {
		vec![
			Chunk::new("cats are mammals", "animals.txt"),
			Chunk::new("dogs are mammals", "animals.txt"),
			Chunk::new("rocks are not alive", "geology.txt"),
		]
	}

	#[test]
	fn ranks_by_lexical_overlap() {
		let retriever = Bm25Retriever::from_chunks(corpus()).unwrap();
		let hits = retriever.retrieve("are cats mammals?", 3).unwrap();
		assert_eq!(hits[0].chunk.content, "cats are mammals");
		assert_eq!(hits.len(), 2, "rocks share only stop words with the query");
		assert!(hits[0].score > hits[1].score);
		assert!(hits.iter().all(|h| h.source == SourceKind::Text));
	}

	#[test]
	fn empty_and_stopword_queries_match_nothing() {
		let retriever = Bm25Retriever::from_chunks(corpus()).unwrap();
		assert!(retriever.retrieve("", 3).unwrap().is_empty());
		assert!(retriever.retrieve("   ", 3).unwrap().is_empty());
		assert!(retriever.retrieve("are the", 3).unwrap().is_empty());
	}

	#[test]
	fn respects_k_and_ties_follow_insertion_order() {
		let retriever = Bm25Retriever::from_chunks(corpus()).unwrap();
		let hits = retriever.retrieve("mammals", 1).unwrap();
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].chunk.content, "cats are mammals");

		let hits = retriever.retrieve("mammals", 10).unwrap();
		let contents: Vec<&str> = hits.iter().map(|h| h.chunk.content.as_str()).collect();
		assert_eq!(contents, vec!["cats are mammals", "dogs are mammals"]);
	}

	#[test]
	fn zero_k_is_rejected() {
		let retriever = Bm25Retriever::from_chunks(corpus()).unwrap();
		assert!(matches!(retriever.retrieve("cats", 0), Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn empty_corpus_returns_nothing() {
		let retriever = Bm25Retriever::from_chunks(Vec::new()).unwrap();
		assert!(retriever.is_empty());
		assert!(retriever.retrieve("cats", 5).unwrap().is_empty());
	}
}
