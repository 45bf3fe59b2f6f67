//! Upload session issuance
//!
//! Pre-flight checks run on client-declared metadata before any bytes move.
//! Only a request that passes every check gets a file id and an upload target.

use intake_core::constants::{FALLBACK_FILE_NAME, MAX_SANITIZED_NAME_LEN};
use intake_core::{UploadRequest, UploadSession, ValidationError, ValidationPolicy};
use intake_processing::sniffer::{declared_type, is_raster_image, normalize_mime_type};
use intake_processing::PolicyValidator;
use intake_storage::{generate_upload_key, Storage};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Every reason a pre-flight request was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Upload rejected: {}", codes(.errors))]
pub struct PreflightRejection {
    pub errors: Vec<ValidationError>,
}

fn codes(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.code())
        .collect::<Vec<_>>()
        .join(", ")
}

impl PreflightRejection {
    fn single(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

/// Make a client-supplied name safe to embed in a storage key.
///
/// Keeps the last path segment only, replaces anything outside
/// `[A-Za-z0-9._-]`, collapses dot runs, drops leading dots and caps the
/// length while keeping the extension. Never returns an empty name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut sanitized = String::with_capacity(base.len());
    for c in base.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
            c
        } else {
            '_'
        };
        if c == '.' && sanitized.ends_with('.') {
            continue;
        }
        sanitized.push(c);
    }

    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.' || c == '_') {
        return FALLBACK_FILE_NAME.to_string();
    }

    truncate_keeping_extension(sanitized, MAX_SANITIZED_NAME_LEN)
}

/// `name` is ASCII at this point, so byte offsets are char boundaries
fn truncate_keeping_extension(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }

    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() + 1 < max_len => {
            let keep = max_len - ext.len() - 1;
            format!("{}.{}", &stem[..keep.min(stem.len())], ext)
        }
        _ => name[..max_len].to_string(),
    }
}

/// Issues one-time upload targets for requests that pass pre-flight
#[derive(Clone)]
pub struct UploadSessionIssuer {
    policy: Arc<ValidationPolicy>,
    storage: Arc<dyn Storage>,
}

impl UploadSessionIssuer {
    pub fn new(policy: Arc<ValidationPolicy>, storage: Arc<dyn Storage>) -> Self {
        Self { policy, storage }
    }

    /// Check declared metadata, accumulating every failure
    pub fn preflight(&self, request: &UploadRequest) -> Result<(), PreflightRejection> {
        let validator = PolicyValidator::new(&self.policy);
        let mut errors = Vec::new();

        let recompressible = request
            .declared_mime
            .as_deref()
            .map(|m| is_raster_image(&normalize_mime_type(m)))
            .or_else(|| declared_type(&request.file_name).map(|t| is_raster_image(t.mime_type)))
            .unwrap_or(false);
        let limit = self
            .policy
            .effective_size_limit(request.size_limit, recompressible);
        if let Err(e) = validator.validate_size(request.declared_size, limit) {
            errors.push(e);
        }

        if let Err(e) = validator.validate_extension(&request.file_name) {
            errors.push(e);
        }

        let narrowed = request.allowed_types.as_deref();
        match request.declared_mime.as_deref() {
            Some(mime_type) => {
                if let Err(e) = validator.validate_declared_mime(mime_type, narrowed) {
                    errors.push(e);
                }
            }
            None => {
                // Without a declared MIME the name's type must fit the override
                if let (Some(allowed), Some(implied)) =
                    (narrowed, declared_type(&request.file_name))
                {
                    if !allowed
                        .iter()
                        .any(|t| normalize_mime_type(t) == implied.mime_type)
                    {
                        errors.push(ValidationError::DisallowedType {
                            mime_type: implied.mime_type.to_string(),
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PreflightRejection { errors })
        }
    }

    /// Run pre-flight, then mint a file id and request an upload target.
    ///
    /// No id is minted when pre-flight fails. A storage failure or timeout
    /// after minting is reported as `UploadTargetUnavailable`.
    pub async fn issue(&self, request: &UploadRequest) -> Result<UploadSession, PreflightRejection> {
        if let Err(rejection) = self.preflight(request) {
            tracing::info!(
                file_name = %request.file_name,
                declared_size = request.declared_size,
                errors = %codes(&rejection.errors),
                "Upload pre-flight rejected"
            );
            return Err(rejection);
        }

        let file_id = Uuid::new_v4();
        let sanitized_name = sanitize_file_name(&request.file_name);
        let storage_key = generate_upload_key(request.user_id, file_id, &sanitized_name)
            .map_err(|e| {
                PreflightRejection::single(ValidationError::UploadTargetUnavailable {
                    reason: e.to_string(),
                })
            })?;

        let content_type = request
            .declared_mime
            .as_deref()
            .map(normalize_mime_type)
            .or_else(|| declared_type(&request.file_name).map(|t| t.mime_type.to_string()))
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let ttl = self.policy.upload_url_ttl;
        let issued = tokio::time::timeout(
            self.policy.upload_url_timeout,
            self.storage
                .presigned_put_url(&storage_key, &content_type, ttl),
        )
        .await;

        let upload_url = match issued {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                tracing::error!(
                    backend = self.storage.backend_name(),
                    file_id = %file_id,
                    error = %e,
                    "Failed to issue upload target"
                );
                return Err(PreflightRejection::single(
                    ValidationError::UploadTargetUnavailable {
                        reason: e.to_string(),
                    },
                ));
            }
            Err(_) => {
                tracing::error!(
                    backend = self.storage.backend_name(),
                    file_id = %file_id,
                    timeout_secs = self.policy.upload_url_timeout.as_secs(),
                    "Timed out issuing upload target"
                );
                return Err(PreflightRejection::single(
                    ValidationError::UploadTargetUnavailable {
                        reason: "timed out waiting for storage".to_string(),
                    },
                ));
            }
        };

        tracing::info!(
            file_id = %file_id,
            storage_key = %storage_key,
            backend = self.storage.backend_name(),
            "Upload session issued"
        );

        Ok(UploadSession {
            file_id,
            upload_url,
            storage_key,
            sanitized_name,
            expires_in: ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd.jpg"), "passwd.jpg");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\photo.png"), "photo.png");
    }

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_file_name("résumé.pdf"), "r_sum_.pdf");
        assert_eq!(sanitize_file_name("a;rm -rf.txt"), "a_rm_-rf.txt");
    }

    #[test]
    fn test_sanitize_dots() {
        assert_eq!(sanitize_file_name(".htaccess"), "htaccess");
        assert_eq!(sanitize_file_name("...hidden.txt"), "hidden.txt");
        assert_eq!(sanitize_file_name("a..b.txt"), "a.b.txt");
        assert!(!sanitize_file_name("..").contains(".."));
    }

    #[test]
    fn test_sanitize_fallback() {
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name("dir/"), "file");
        assert_eq!(sanitize_file_name("???"), "file");
    }

    #[test]
    fn test_sanitize_caps_length_keeping_extension() {
        let long = format!("{}.jpeg", "a".repeat(300));
        let sanitized = sanitize_file_name(&long);
        assert_eq!(sanitized.len(), MAX_SANITIZED_NAME_LEN);
        assert!(sanitized.ends_with(".jpeg"));

        let no_ext = "b".repeat(300);
        assert_eq!(sanitize_file_name(&no_ext).len(), MAX_SANITIZED_NAME_LEN);
    }

    #[test]
    fn test_rejection_display_lists_codes() {
        let rejection = PreflightRejection {
            errors: vec![
                ValidationError::EmptyFile,
                ValidationError::DisallowedExtension {
                    extension: "exe".to_string(),
                },
            ],
        };
        assert_eq!(
            rejection.to_string(),
            "Upload rejected: EMPTY_FILE, DISALLOWED_EXTENSION"
        );
    }
}
