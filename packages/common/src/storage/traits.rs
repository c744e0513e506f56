use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::StorageError;
use super::path;
use crate::validation::ImageValidator;

/// Default lifetime of access URLs.
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// An image upload as received from a caller.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub data: &'a [u8],
    /// Original client filename, used only to pick the stored extension.
    pub filename: Option<&'a str>,
    /// Declared content type.
    pub content_type: Option<&'a str>,
    /// Owning team; partitions the storage path.
    pub team_id: i64,
    /// Uploading user.
    pub user_id: i64,
}

/// Storage coordinates and intrinsic properties of a persisted image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub storage_path: String,
    pub filename: String,
    pub original_filename: Option<String>,
    pub media_type: String,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
}

/// Tenant-partitioned image object storage.
///
/// Backends implement the raw object operations; validation, path layout and
/// URL fallback are shared by the provided methods.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Validator applied by [`ObjectStore::put`].
    fn validator(&self) -> &ImageValidator;

    /// URL returned when a real one cannot be produced.
    fn placeholder_url(&self) -> &str;

    /// Write `data` at `path` exactly once; on failure nothing is visible at `path`.
    async fn write_object(
        &self,
        path: &str,
        data: &[u8],
        media_type: &str,
    ) -> Result<(), StorageError>;

    /// Read all bytes of an object.
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;

    /// Produce an access URL valid for roughly `ttl`.
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Validate and persist an upload under a fresh tenant-partitioned path.
    async fn put(&self, upload: Upload<'_>) -> Result<StoredObject, StorageError> {
        let props = self.validator().validate(upload.data)?;

        let extension = path::resolve_extension(upload.filename, props.format);
        let media_type = path::resolve_media_type(upload.content_type, props.format);
        let storage_path = path::object_path(upload.team_id, &extension, Utc::now());

        self.write_object(&storage_path, upload.data, &media_type)
            .await?;

        info!(
            backend = self.backend(),
            path = %storage_path,
            team_id = upload.team_id,
            user_id = upload.user_id,
            size = props.size_bytes,
            "Stored image"
        );

        Ok(StoredObject {
            filename: path::filename_of(&storage_path).to_string(),
            storage_path,
            original_filename: upload.filename.map(str::to_string),
            media_type,
            size_bytes: props.size_bytes,
            width: props.width,
            height: props.height,
        })
    }

    /// Access URL for `path`, degrading to the placeholder instead of failing.
    async fn url_for(&self, path: &str, ttl: Duration) -> String {
        match self.signed_url(path, ttl).await {
            Ok(url) => url,
            Err(e) => {
                warn!(backend = self.backend(), path, error = %e, "Falling back to placeholder URL");
                self.placeholder_url().to_string()
            }
        }
    }
}
