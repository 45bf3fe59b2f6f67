//! In-memory storage backend
//!
//! Issues upload targets without talking to a real object store. For
//! development and tests only: nothing is ever uploaded. The most recent
//! issued targets are kept for inspection, up to a fixed capacity.

use crate::keys::validate_storage_key;
use crate::traits::{Storage, StorageResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// An upload target handed out by [`MemoryStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTarget {
    pub storage_key: String,
    pub content_type: String,
    pub url: String,
}

/// Issued targets remembered by default
pub const DEFAULT_ISSUED_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct MemoryStorage {
    base_url: String,
    capacity: usize,
    issued: Arc<Mutex<VecDeque<IssuedTarget>>>,
}

impl MemoryStorage {
    /// Create a new MemoryStorage
    ///
    /// # Arguments
    /// * `base_url` - Prefix of the generated URLs (e.g. "memory://uploads")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            capacity: DEFAULT_ISSUED_CAPACITY,
            issued: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Remember at most `capacity` targets; older ones are forgotten first
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Retained targets, oldest first
    pub async fn issued(&self) -> Vec<IssuedTarget> {
        self.issued.lock().await.iter().cloned().collect()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new("memory://uploads")
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn presigned_put_url(
        &self,
        storage_key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_storage_key(storage_key)?;

        let url = format!(
            "{}/{}?token={}&expires_in={}",
            self.base_url,
            storage_key,
            Uuid::new_v4().simple(),
            expires_in.as_secs()
        );

        tracing::debug!(storage_key = %storage_key, "Issued in-memory upload target");

        let mut issued = self.issued.lock().await;
        if self.capacity > 0 {
            while issued.len() >= self.capacity {
                issued.pop_front();
            }
            issued.push_back(IssuedTarget {
                storage_key: storage_key.to_string(),
                content_type: content_type.to_string(),
                url: url.clone(),
            });
        }

        Ok(url)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
