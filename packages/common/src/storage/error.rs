use std::fmt;

use crate::validation::ImageRejection;

/// Errors that can occur during object storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// The upload was rejected before anything was written.
    Validation(ImageRejection),
    /// A caller-supplied storage path is malformed or escapes the tenant tree.
    InvalidPath(String),
    /// The requested object does not exist.
    NotFound(String),
    /// Persisting an object failed; nothing is visible at `path`.
    Write { path: String, message: String },
    /// Reading an existing object failed.
    Read { path: String, message: String },
    /// The backend failed to remove an object.
    Delete { path: String, message: String },
    /// An I/O error outside of a specific object (e.g. preparing directories).
    Io(std::io::Error),
    /// The backend could not be constructed from configuration.
    Config(String),
}

impl StorageError {
    /// Whether the failure was caused by caller input rather than the backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidPath(_) | Self::NotFound(_)
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(reason) => write!(f, "{reason}"),
            Self::InvalidPath(path) => write!(f, "invalid storage path: {path}"),
            Self::NotFound(path) => write!(f, "object not found: {path}"),
            Self::Write { path, message } => write!(f, "failed to write {path}: {message}"),
            Self::Read { path, message } => write!(f, "failed to read {path}: {message}"),
            Self::Delete { path, message } => write!(f, "failed to delete {path}: {message}"),
            Self::Io(err) => write!(f, "storage IO error: {err}"),
            Self::Config(msg) => write!(f, "storage configuration error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(reason) => Some(reason),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ImageRejection> for StorageError {
    fn from(reason: ImageRejection) -> Self {
        Self::Validation(reason)
    }
}
