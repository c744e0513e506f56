use serde::Deserialize;

use crate::validation::ImageValidator;

/// Which object storage backend a deployment writes to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Local,
    Cloud,
}

/// Local filesystem backend settings.
#[derive(Debug, Deserialize, Clone)]
pub struct LocalStorageConfig {
    /// Root directory objects are written under. Default: "./storage".
    #[serde(default = "default_local_root")]
    pub root: String,
    /// Base URL the root directory is served from. Default: "http://localhost:8000".
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_local_root() -> String {
    "./storage".into()
}
fn default_public_base_url() -> String {
    "http://localhost:8000".into()
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root: default_local_root(),
            public_base_url: default_public_base_url(),
        }
    }
}

/// S3-compatible bucket settings.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CloudStorageConfig {
    /// Bucket name. Required when the cloud backend is selected.
    #[serde(default)]
    pub bucket: String,
    /// Region name. Default: "us-east-1".
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, GCS interop, R2).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Access key. Falls back to the ambient credential chain when unset.
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Use path-style addressing instead of virtual-hosted buckets.
    #[serde(default)]
    pub path_style: bool,
}

fn default_region() -> String {
    "us-east-1".into()
}

/// Storage section of the application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageAppConfig {
    /// Backend selected at startup. Default: local.
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Maximum accepted upload in bytes. Default: 10 MiB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    /// Image formats accepted on upload. Default: jpg, jpeg, png, gif, webp.
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: Vec<String>,
    /// Lifetime of generated access URLs in seconds. Default: 900.
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
    /// URL handed out when a real one cannot be generated.
    #[serde(default = "default_placeholder_url")]
    pub placeholder_url: String,
    #[serde(default)]
    pub local: LocalStorageConfig,
    #[serde(default)]
    pub cloud: CloudStorageConfig,
}

fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024
}
fn default_allowed_formats() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_url_ttl_secs() -> u64 {
    15 * 60
}
fn default_placeholder_url() -> String {
    "http://localhost:8000/placeholder-image".into()
}

impl Default for StorageAppConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            max_upload_size: default_max_upload_size(),
            allowed_formats: default_allowed_formats(),
            url_ttl_secs: default_url_ttl_secs(),
            placeholder_url: default_placeholder_url(),
            local: LocalStorageConfig::default(),
            cloud: CloudStorageConfig::default(),
        }
    }
}

impl StorageAppConfig {
    /// Build the upload validator described by this section.
    pub fn validator(&self) -> ImageValidator {
        ImageValidator::new(self.max_upload_size, &self.allowed_formats)
    }

    /// Check settings that cannot be expressed through serde defaults.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_upload_size == 0 {
            return Err("storage.max_upload_size must be greater than zero".into());
        }
        if self.allowed_formats.is_empty() {
            return Err("storage.allowed_formats must not be empty".into());
        }
        if self.backend == StorageBackendKind::Cloud && self.cloud.bucket.trim().is_empty() {
            return Err("storage.cloud.bucket is required for the cloud backend".into());
        }
        Ok(())
    }
}
