use common::ImageRejection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("{0} input is not supported by this strategy")]
    Unsupported(&'static str),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("embedding produced no usable values")]
    Empty,

    #[error("embedding task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector index unavailable: {0}")]
    Unavailable(String),

    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector index rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to decode vector index response: {0}")]
    Decode(String),
}

impl IndexError {
    /// Whether repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Vector search is not enabled on this server")]
    Disabled,

    #[error("Could not generate an embedding for the query")]
    EmptyQuery,

    #[error("No text embedding model is loaded, text search is unavailable")]
    TextModelUnavailable,

    #[error("Reference image not found: {0}")]
    ReferenceNotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InvalidImage(#[from] ImageRejection),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl SearchError {
    /// Whether the caller can fix the request and retry.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyQuery
                | Self::ReferenceNotFound(_)
                | Self::InvalidRequest(_)
                | Self::InvalidImage(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
