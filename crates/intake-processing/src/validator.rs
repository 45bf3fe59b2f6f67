use intake_core::{ValidationError, ValidationPolicy};

use crate::sniffer::{file_extension, is_raster_image, normalize_mime_type, DetectedType};

const NO_EXTENSION: &str = "<none>";

/// Policy validator
///
/// Checks size, detected type and extension against a [`ValidationPolicy`].
/// [`PolicyValidator::validate_all`] runs every check and reports every
/// failure; nothing short-circuits.
pub struct PolicyValidator<'a> {
    policy: &'a ValidationPolicy,
}

impl<'a> PolicyValidator<'a> {
    pub fn new(policy: &'a ValidationPolicy) -> Self {
        Self { policy }
    }

    /// Validate a size against `max_size`
    pub fn validate_size(&self, size: usize, max_size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > max_size {
            return Err(ValidationError::SizeExceeded {
                size,
                max: max_size,
            });
        }

        Ok(())
    }

    /// Validate the extension of `file_name` against the policy allow-list
    pub fn validate_extension(&self, file_name: &str) -> Result<String, ValidationError> {
        let extension = file_extension(file_name).ok_or_else(|| {
            ValidationError::DisallowedExtension {
                extension: NO_EXTENSION.to_string(),
            }
        })?;

        if !self.policy.allows_extension(&extension) {
            return Err(ValidationError::DisallowedExtension { extension });
        }

        Ok(extension)
    }

    /// Validate a MIME type against the policy allow-list
    pub fn validate_mime_type(&self, mime_type: &str) -> Result<(), ValidationError> {
        let normalized = normalize_mime_type(mime_type);

        if !self.policy.allows_mime_type(&normalized) {
            return Err(ValidationError::DisallowedType {
                mime_type: normalized,
            });
        }

        Ok(())
    }

    /// Validate a client-declared MIME type. A caller-supplied `narrowed`
    /// list can only restrict the policy allow-list, never widen it.
    pub fn validate_declared_mime(
        &self,
        mime_type: &str,
        narrowed: Option<&[String]>,
    ) -> Result<(), ValidationError> {
        self.validate_mime_type(mime_type)?;

        let normalized = normalize_mime_type(mime_type);
        if let Some(allowed) = narrowed {
            if !allowed.iter().any(|t| normalize_mime_type(t) == normalized) {
                return Err(ValidationError::DisallowedType {
                    mime_type: normalized,
                });
            }
        }

        Ok(())
    }

    /// Run every policy check on a received file.
    ///
    /// `detected` is `None` when sniffing failed; the type check is then left
    /// to the sniffer's own error. Raster images are held to the policy's
    /// input limit, since normalization runs before the final size check.
    pub fn validate_all(
        &self,
        file_name: &str,
        size: usize,
        detected: Option<&DetectedType>,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let recompressible = detected.is_some_and(|d| is_raster_image(d.mime_type));
        let limit = self.policy.received_size_limit(recompressible);
        if let Err(e) = self.validate_size(size, limit) {
            errors.push(e);
        }
        if let Some(detected) = detected {
            if let Err(e) = self.validate_mime_type(detected.mime_type) {
                errors.push(e);
            }
        }
        if let Err(e) = self.validate_extension(file_name) {
            errors.push(e);
        }

        errors
    }
}
