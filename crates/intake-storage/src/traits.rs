//! Storage abstraction trait

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object storage as seen by the ingestion pipeline.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Generate a presigned PUT URL for a single direct upload to `storage_key`.
    async fn presigned_put_url(
        &self,
        storage_key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}
