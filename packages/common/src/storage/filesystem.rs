use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::error::StorageError;
use super::path::validate_storage_path;
use super::traits::ObjectStore;
use crate::validation::ImageValidator;

/// Filesystem-backed object store for development and single-node deployments.
///
/// Objects live at `{root}/{storage_path}` and are served from
/// `{public_base_url}/storage/{storage_path}`. URLs are stable; the TTL is
/// ignored.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
    placeholder_url: String,
    validator: ImageValidator,
}

impl LocalObjectStore {
    /// Create a new local store, creating the root and scratch directories.
    pub async fn new(
        root: PathBuf,
        public_base_url: impl Into<String>,
        placeholder_url: impl Into<String>,
        validator: ImageValidator,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self {
            root,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            placeholder_url: placeholder_url.into(),
            validator,
        })
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Resolve a storage path to its location on disk.
    fn object_file(&self, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(validate_storage_path(path)?))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.root
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn validator(&self) -> &ImageValidator {
        &self.validator
    }

    fn placeholder_url(&self) -> &str {
        &self.placeholder_url
    }

    async fn write_object(
        &self,
        path: &str,
        data: &[u8],
        _media_type: &str,
    ) -> Result<(), StorageError> {
        let target = self.object_file(path)?;
        let write_err = |e: std::io::Error| StorageError::Write {
            path: path.to_string(),
            message: e.to_string(),
        };

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(write_err(e));
        }

        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(write_err(e));
            }
        }

        if let Err(e) = fs::rename(&temp_path, &target).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(write_err(e));
        }

        debug!(path = %target.display(), "Wrote object to local storage");
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let file = self.object_file(path)?;
        match fs::read(&file).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(path.into())),
            Err(e) => Err(StorageError::Read {
                path: path.into(),
                message: e.to_string(),
            }),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let file = self.object_file(path)?;
        Ok(fs::try_exists(&file).await?)
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let file = self.object_file(path)?;
        match fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path, "Object does not exist in local storage when attempting to delete");
                Ok(false)
            }
            Err(e) => Err(StorageError::Delete {
                path: path.into(),
                message: e.to_string(),
            }),
        }
    }

    async fn signed_url(&self, path: &str, _ttl: Duration) -> Result<String, StorageError> {
        if !self.exists(path).await? {
            return Err(StorageError::NotFound(path.into()));
        }
        Ok(format!("{}/storage/{path}", self.public_base_url))
    }
}
