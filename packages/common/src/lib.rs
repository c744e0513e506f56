pub mod config;
pub mod retry;
pub mod storage;
pub mod validation;

pub use config::{CloudStorageConfig, LocalStorageConfig, StorageAppConfig, StorageBackendKind};
pub use retry::{RetryPolicy, calculate_backoff, retry_with_backoff};
pub use validation::{ImageProperties, ImageRejection, ImageValidator};
