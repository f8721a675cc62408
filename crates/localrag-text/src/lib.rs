//! localrag-text
//!
//! Tantivy-based sparse retrieval. The BM25 index lives in RAM and is built
//! once per corpus snapshot.

pub mod tantivy_utils;
pub mod bm25;

pub use bm25::Bm25Retriever;
