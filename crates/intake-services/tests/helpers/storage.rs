use async_trait::async_trait;
use intake_services::{Storage, StorageError, StorageResult};
use std::time::Duration;

/// Backend that refuses every request
pub struct FailingStorage;

#[async_trait]
impl Storage for FailingStorage {
    async fn presigned_put_url(
        &self,
        _storage_key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Err(StorageError::BackendError("bucket unreachable".to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Backend that answers only after `delay`
pub struct SlowStorage {
    pub delay: Duration,
}

#[async_trait]
impl Storage for SlowStorage {
    async fn presigned_put_url(
        &self,
        storage_key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        tokio::time::sleep(self.delay).await;
        Ok(format!("slow://{}", storage_key))
    }

    fn backend_name(&self) -> &'static str {
        "slow"
    }
}
