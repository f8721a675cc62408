//! localrag-vector
//!
//! LanceDB chunk store, the fingerprint-keyed index cache and the dense
//! retriever built on top of them.

pub mod cache;
pub mod dense;
pub mod schema;
pub mod store;

pub use cache::{CacheOutcome, IndexState, VectorIndexCache};
pub use dense::DenseRetriever;
pub use store::{StoredHit, VectorStore};
