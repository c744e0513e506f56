mod error;
mod path;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod object;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

pub use error::StorageError;
pub use filesystem::LocalObjectStore;
#[cfg(feature = "object-storage")]
pub use object::S3ObjectStore;
pub use path::{
    TENANT_ROOT, filename_of, object_path, resolve_extension, resolve_media_type,
    validate_storage_path,
};
pub use traits::{DEFAULT_URL_TTL, ObjectStore, StoredObject, Upload};

use crate::config::{StorageAppConfig, StorageBackendKind};

/// Construct the backend selected by configuration.
///
/// Called once at startup; callers hold the returned handle and never branch
/// on the backend kind themselves.
pub async fn from_config(config: &StorageAppConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    config.validate().map_err(StorageError::Config)?;
    let validator = config.validator();

    match config.backend {
        StorageBackendKind::Local => {
            info!(root = %config.local.root, "Using local object storage");
            let store = LocalObjectStore::new(
                PathBuf::from(&config.local.root),
                config.local.public_base_url.clone(),
                config.placeholder_url.clone(),
                validator,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "object-storage")]
        StorageBackendKind::Cloud => Ok(Arc::new(S3ObjectStore::new(
            &config.cloud,
            config.placeholder_url.clone(),
            validator,
        )?)),
        #[cfg(not(feature = "object-storage"))]
        StorageBackendKind::Cloud => Err(StorageError::Config(
            "cloud storage requires the `object-storage` feature".into(),
        )),
    }
}
