//! Shared key generation for storage backends.

use intake_core::constants::{ANONYMOUS_OWNER, UPLOAD_KEY_PREFIX};
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Generate the storage key for an upload.
///
/// `sanitized_name` must already be free of separators and traversal
/// sequences; the key is validated before it is returned.
pub fn generate_upload_key(
    user_id: Option<Uuid>,
    file_id: Uuid,
    sanitized_name: &str,
) -> StorageResult<String> {
    let owner = user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| ANONYMOUS_OWNER.to_string());
    let key = format!(
        "{}/{}/{}/{}",
        UPLOAD_KEY_PREFIX, owner, file_id, sanitized_name
    );
    validate_storage_key(&key)?;
    Ok(key)
}

/// Reject keys that could escape their prefix.
pub fn validate_storage_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_key_layout() {
        let file_id = Uuid::new_v4();
        let key = generate_upload_key(None, file_id, "photo.png").unwrap();
        assert_eq!(key, format!("uploads/anonymous/{}/photo.png", file_id));
    }

    #[test]
    fn test_user_key_layout() {
        let user_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();
        let key = generate_upload_key(Some(user_id), file_id, "a.pdf").unwrap();
        assert!(key.starts_with(&format!("uploads/{}/", user_id)));
        assert!(key.ends_with(&format!("{}/a.pdf", file_id)));
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(generate_upload_key(None, Uuid::new_v4(), "../passwd").is_err());
        assert!(validate_storage_key("/etc/passwd").is_err());
        assert!(validate_storage_key("uploads\\x").is_err());
        assert!(validate_storage_key("uploads/a/b.png").is_ok());
    }
}
