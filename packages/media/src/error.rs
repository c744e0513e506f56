use common::storage::StorageError;
use search::SearchError;
use thiserror::Error;
use tracing::{error, warn};

/// Caller-facing error. Internal failures are logged on conversion and
/// carry no detail.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Vector search is not enabled on this server")]
    SearchDisabled,

    #[error("{0}")]
    Unavailable(String),

    #[error("An unexpected error occurred")]
    Internal,
}

impl MediaError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::SearchDisabled => "SEARCH_DISABLED",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal | Self::Unavailable(_))
    }
}

impl From<StorageError> for MediaError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation(reason) => Self::Validation(reason.to_string()),
            StorageError::InvalidPath(path) => {
                warn!(path = %path, "Rejected storage path");
                Self::Validation("Invalid storage path".into())
            }
            StorageError::NotFound(_) => Self::NotFound("Image not found".into()),
            other => {
                error!(error = %other, "Storage operation failed");
                Self::Internal
            }
        }
    }
}

impl From<SearchError> for MediaError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Disabled => Self::SearchDisabled,
            SearchError::TextModelUnavailable => {
                warn!("Text search unavailable, no text embedding model is loaded");
                Self::Unavailable(err.to_string())
            }
            SearchError::ReferenceNotFound(id) => {
                Self::NotFound(format!("Reference image not found: {id}"))
            }
            SearchError::EmptyQuery
            | SearchError::InvalidRequest(_)
            | SearchError::InvalidImage(_) => Self::Validation(err.to_string()),
            other => {
                error!(error = %other, "Search operation failed");
                Self::Internal
            }
        }
    }
}
