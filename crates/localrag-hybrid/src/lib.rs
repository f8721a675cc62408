//! localrag-hybrid
//!
//! Weighted rank fusion of the dense and sparse retrievers, second-stage
//! reranking, chat backends and the question-answering pipeline.

pub mod fusion;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod rerank;

pub use fusion::{fuse, EnsembleRetriever, FusedChunk, DEFAULT_RRF_CONSTANT};
pub use llm::ChatProvider;
pub use pipeline::{Answer, QueryTimings, RagPipeline};
pub use rerank::{RerankOptions, Reranker};
