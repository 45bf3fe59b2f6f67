//! Validation outcome

use bytes::Bytes;
use serde::Serialize;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// What the pipeline learned about an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMetadata {
    pub original_size: usize,
    /// Size of the final bytes when a transformation replaced the original
    pub compressed_size: Option<usize>,
    pub mime_type: String,
    pub extension: String,
    /// SHA-256 of the final bytes, lowercase hex
    pub hash: String,
    pub original_dimensions: Option<Dimensions>,
    pub final_dimensions: Option<Dimensions>,
}

/// Result of validating one upload.
///
/// The processed bytes are only reachable when the outcome is valid; the
/// constructors keep that invariant, so the fields are private.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    is_valid: bool,
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationError>,
    #[serde(skip)]
    processed_bytes: Option<Bytes>,
    metadata: Option<FileMetadata>,
}

impl ValidationOutcome {
    pub fn accepted(
        processed_bytes: Bytes,
        metadata: FileMetadata,
        warnings: Vec<ValidationError>,
    ) -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings,
            processed_bytes: Some(processed_bytes),
            metadata: Some(metadata),
        }
    }

    pub fn rejected(
        errors: Vec<ValidationError>,
        metadata: Option<FileMetadata>,
        warnings: Vec<ValidationError>,
    ) -> Self {
        debug_assert!(!errors.is_empty(), "a rejection needs at least one error");
        Self {
            is_valid: false,
            errors,
            warnings,
            processed_bytes: None,
            metadata,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationError] {
        &self.warnings
    }

    pub fn processed_bytes(&self) -> Option<&Bytes> {
        self.processed_bytes.as_ref()
    }

    pub fn metadata(&self) -> Option<&FileMetadata> {
        self.metadata.as_ref()
    }

    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code() == code)
    }

    /// Split into bytes and metadata, consuming the outcome.
    pub fn into_parts(
        self,
    ) -> (
        Option<Bytes>,
        Option<FileMetadata>,
        Vec<ValidationError>,
        Vec<ValidationError>,
    ) {
        (
            self.processed_bytes,
            self.metadata,
            self.errors,
            self.warnings,
        )
    }
}
