use std::time::Duration;

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tracing::{debug, info, warn};

use super::error::StorageError;
use super::path::validate_storage_path;
use super::traits::ObjectStore;
use crate::config::CloudStorageConfig;
use crate::validation::ImageValidator;

/// Longest presigned URL lifetime S3 accepts (7 days).
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

/// S3-compatible bucket store with presigned GET URLs.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    placeholder_url: String,
    validator: ImageValidator,
}

impl S3ObjectStore {
    pub fn new(
        config: &CloudStorageConfig,
        placeholder_url: impl Into<String>,
        validator: ImageValidator,
    ) -> Result<Self, StorageError> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| StorageError::Config(format!("invalid region: {e}")))?,
        };

        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) => {
                Credentials::new(Some(access.as_str()), Some(secret.as_str()), None, None, None)
            }
            _ => Credentials::default(),
        }
        .map_err(|e| StorageError::Config(format!("invalid credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StorageError::Config(format!("invalid bucket: {e}")))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        info!(bucket = %config.bucket, "Using S3-compatible object storage");

        Ok(Self {
            bucket,
            placeholder_url: placeholder_url.into(),
            validator,
        })
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn presign_secs(ttl: Duration) -> u32 {
    ttl.as_secs().clamp(1, MAX_PRESIGN_SECS) as u32
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn backend(&self) -> &'static str {
        "cloud"
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
        media_type: &str,
    ) -> Result<(), StorageError> {
        validate_storage_path(path)?;
        let write_err = |message: String| StorageError::Write {
            path: path.to_string(),
            message,
        };

        let response = self
            .bucket
            .put_object_with_content_type(path, data, media_type)
            .await
            .map_err(|e| write_err(e.to_string()))?;

        if !is_success(response.status_code()) {
            return Err(write_err(format!(
                "unexpected status {}",
                response.status_code()
            )));
        }

        debug!(path, "Uploaded object to bucket");
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        validate_storage_path(path)?;
        let read_err = |message: String| StorageError::Read {
            path: path.to_string(),
            message,
        };

        let response = self
            .bucket
            .get_object(path)
            .await
            .map_err(|e| read_err(e.to_string()))?;

        match response.status_code() {
            404 => Err(StorageError::NotFound(path.into())),
            status if is_success(status) => Ok(response.bytes().to_vec()),
            status => Err(read_err(format!("unexpected status {status}"))),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        validate_storage_path(path)?;
        let (_, status) = self
            .bucket
            .head_object(path)
            .await
            .map_err(|e| StorageError::Read {
                path: path.into(),
                message: e.to_string(),
            })?;

        match status {
            404 => Ok(false),
            status if is_success(status) => Ok(true),
            status => Err(StorageError::Read {
                path: path.into(),
                message: format!("unexpected status {status}"),
            }),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        if !self.exists(path).await? {
            warn!(path, "Object does not exist in bucket when attempting to delete");
            return Ok(false);
        }

        let delete_err = |message: String| StorageError::Delete {
            path: path.to_string(),
            message,
        };

        let response = self
            .bucket
            .delete_object(path)
            .await
            .map_err(|e| delete_err(e.to_string()))?;

        match response.status_code() {
            404 => Ok(false),
            status if is_success(status) => {
                info!(path, "Deleted object from bucket");
                Ok(true)
            }
            status => Err(delete_err(format!("unexpected status {status}"))),
        }
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        if !self.exists(path).await? {
            return Err(StorageError::NotFound(path.into()));
        }

        self.bucket
            .presign_get(path, presign_secs(ttl), None)
            .await
            .map_err(|e| StorageError::Read {
                path: path.into(),
                message: format!("failed to presign: {e}"),
            })
    }
}
