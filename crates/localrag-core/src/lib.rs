#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod data_processor;
pub mod error;
pub mod fingerprint;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use fingerprint::fingerprint;
pub use types::{CandidateList, Chunk, ChunkKey, Metadata, ScoredChunk, SourceKind};
