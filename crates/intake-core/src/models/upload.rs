//! Upload session models

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata a client declares before transferring any bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    pub declared_size: usize,
    #[serde(default)]
    pub declared_mime: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// Narrower MIME allow-list for this request
    #[serde(default)]
    pub allowed_types: Option<Vec<String>>,
    /// Lower size limit for this request
    #[serde(default)]
    pub size_limit: Option<usize>,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, declared_size: usize) -> Self {
        Self {
            file_name: file_name.into(),
            declared_size,
            declared_mime: None,
            user_id: None,
            allowed_types: None,
            size_limit: None,
        }
    }

    pub fn with_declared_mime(mut self, mime: impl Into<String>) -> Self {
        self.declared_mime = Some(mime.into());
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_allowed_types(mut self, types: Vec<String>) -> Self {
        self.allowed_types = Some(types);
        self
    }

    pub fn with_size_limit(mut self, limit: usize) -> Self {
        self.size_limit = Some(limit);
        self
    }
}

/// Identity of an accepted upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileIdentity {
    pub file_id: Uuid,
    pub sanitized_name: String,
    pub storage_key: String,
}

/// A one-time upload target handed back to the client
#[derive(Debug, Clone, Serialize)]
pub struct UploadSession {
    pub file_id: Uuid,
    pub upload_url: String,
    pub storage_key: String,
    pub sanitized_name: String,
    #[serde(with = "duration_secs")]
    pub expires_in: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}
