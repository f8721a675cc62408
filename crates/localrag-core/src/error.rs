use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedder or storage failure while constructing or persisting a vector
    /// index. Nothing is committed when this is returned.
    #[error("Index build failed: {0}")]
    IndexBuild(String),

    /// The remote reranker was unreachable or did not answer with a usable
    /// 200 response.
    #[error("Reranker service error{}: {message}", http_status(.status))]
    RerankerService { status: Option<u16>, message: String },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Reranking failed: {0}")]
    Rerank(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn http_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn reranker_error_mentions_status() {
        let err = Error::RerankerService { status: Some(500), message: "boom".into() };
        assert_eq!(err.to_string(), "Reranker service error (HTTP 500): boom");

        let err = Error::RerankerService { status: None, message: "connection refused".into() };
        assert_eq!(err.to_string(), "Reranker service error: connection refused");
    }
}
