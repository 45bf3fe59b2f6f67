//! Error types module
//!
//! Policy-level problems found while validating an upload are plain data
//! ([`ValidationError`]) that get accumulated into an outcome, never raised.
//! Exceptional faults inside a component (codec crash, scanner I/O) are caught
//! at that component's boundary and converted into one of these variants.

use serde::Serialize;

/// Everything that can be wrong with an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationError {
    #[error("Empty file")]
    EmptyFile,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    SizeExceeded { size: usize, max: usize },

    #[error("Unable to determine file type from content")]
    UndetectableType,

    #[error("File content is {detected} but the file name declares {declared}")]
    TypeMismatch { declared: String, detected: String },

    #[error("File type not allowed: {mime_type}")]
    DisallowedType { mime_type: String },

    #[error("File extension not allowed: {extension}")]
    DisallowedExtension { extension: String },

    #[error("File contains suspicious content")]
    SuspiciousContent,

    #[error("Malware detected: {threat}")]
    MalwareDetected { threat: String },

    /// Only ever reported as a warning; the scan layer is disabled, not failing.
    #[error("Malware scanner unavailable, scan skipped")]
    ScannerUnavailable,

    #[error("Malware scan failed: {reason}")]
    ScannerError { reason: String },

    #[error("Image processing failed: {reason}")]
    ImageProcessingFailure { reason: String },

    #[error("Upload target unavailable: {reason}")]
    UploadTargetUnavailable { reason: String },
}

impl ValidationError {
    /// Machine-readable error code (e.g. "SIZE_EXCEEDED")
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyFile => "EMPTY_FILE",
            ValidationError::SizeExceeded { .. } => "SIZE_EXCEEDED",
            ValidationError::UndetectableType => "UNDETECTABLE_TYPE",
            ValidationError::TypeMismatch { .. } => "TYPE_MISMATCH",
            ValidationError::DisallowedType { .. } => "DISALLOWED_TYPE",
            ValidationError::DisallowedExtension { .. } => "DISALLOWED_EXTENSION",
            ValidationError::SuspiciousContent => "SUSPICIOUS_CONTENT",
            ValidationError::MalwareDetected { .. } => "MALWARE_DETECTED",
            ValidationError::ScannerUnavailable => "SCANNER_UNAVAILABLE",
            ValidationError::ScannerError { .. } => "SCANNER_ERROR",
            ValidationError::ImageProcessingFailure { .. } => "IMAGE_PROCESSING_FAILURE",
            ValidationError::UploadTargetUnavailable { .. } => "UPLOAD_TARGET_UNAVAILABLE",
        }
    }

    /// Whether this error rejects the upload. `ScannerUnavailable` is the one
    /// degraded-but-accepted condition.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ValidationError::ScannerUnavailable)
    }

    /// Client-facing message. Internal fault details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            ValidationError::ScannerError { .. } => {
                "Virus scanning temporarily unavailable".to_string()
            }
            ValidationError::ImageProcessingFailure { .. } => {
                "The image could not be processed".to_string()
            }
            ValidationError::UploadTargetUnavailable { .. } => {
                "Upload storage temporarily unavailable".to_string()
            }
            ValidationError::MalwareDetected { .. } => "File rejected: malware detected".to_string(),
            other => other.to_string(),
        }
    }
}

/// Configuration loading and policy validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid content pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
