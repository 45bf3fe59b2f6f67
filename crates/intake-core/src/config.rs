//! Configuration module
//!
//! Validation policies are fully enumerated records, one per named policy,
//! built once at startup and never mutated afterwards. Environment variables
//! can override the defaults of a named policy.

use std::collections::BTreeSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BLOCKED_CONTENT_PATTERNS, DEFAULT_QUALITY_LADDER, DEFAULT_SCAN_TIMEOUT,
    DEFAULT_TARGET_RATIO, DEFAULT_UPLOAD_URL_TIMEOUT, DEFAULT_UPLOAD_URL_TTL, MB,
};
use crate::error::ConfigError;

/// The named policies a deployment runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Documents, text and everyday images
    General,
    /// Catalogue imagery: images only, tighter size limit, higher resolution cap
    ProductImagery,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::General => "general",
            PolicyKind::ProductImagery => "product-imagery",
        }
    }

    /// Prefix of the environment variables overriding this policy
    pub fn env_prefix(self) -> &'static str {
        match self {
            PolicyKind::General => "INTAKE_GENERAL",
            PolicyKind::ProductImagery => "INTAKE_PRODUCT",
        }
    }
}

/// Largest width and height an accepted image may keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensionCap {
    pub max_width: u32,
    pub max_height: u32,
}

/// Recompression settings for raster images
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionSettings {
    pub enabled: bool,
    /// Quality rungs, strictly descending, each in 1..=100
    pub quality_ladder: Vec<u8>,
    /// Share of the original size a recompressed image should fit in
    pub target_ratio: f32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            quality_ladder: DEFAULT_QUALITY_LADDER.to_vec(),
            target_ratio: DEFAULT_TARGET_RATIO,
        }
    }
}

/// Limits and allow-lists enforced by one service instance
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub kind: PolicyKind,
    pub max_size_bytes: usize,
    /// Largest raw raster image taken in for recompression. The normalized
    /// result must still fit `max_size_bytes`.
    pub max_input_size_bytes: usize,
    pub allowed_mime_types: BTreeSet<String>,
    pub allowed_extensions: BTreeSet<String>,
    pub max_image_dimensions: ImageDimensionCap,
    /// Decoder refuses images with more pixels than this
    pub max_input_pixels: u64,
    pub compression: CompressionSettings,
    pub blocked_content_patterns: Vec<String>,
    pub virus_scanning_enabled: bool,
    /// Drop EXIF from images that are kept without re-encoding
    pub strip_metadata: bool,
    pub scan_timeout: Duration,
    pub upload_url_ttl: Duration,
    pub upload_url_timeout: Duration,
}

fn string_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ValidationPolicy {
    /// General-purpose uploads: images, PDFs, plain text and office documents
    pub fn general() -> Self {
        Self {
            kind: PolicyKind::General,
            max_size_bytes: 10 * MB,
            max_input_size_bytes: 20 * MB,
            allowed_mime_types: string_set(&[
                "image/jpeg",
                "image/png",
                "image/gif",
                "image/webp",
                "application/pdf",
                "text/plain",
                "text/csv",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            ]),
            allowed_extensions: string_set(&[
                "jpg", "jpeg", "png", "gif", "webp", "pdf", "txt", "csv", "docx", "xlsx", "pptx",
            ]),
            max_image_dimensions: ImageDimensionCap {
                max_width: 2048,
                max_height: 2048,
            },
            max_input_pixels: 40_000_000,
            compression: CompressionSettings::default(),
            blocked_content_patterns: DEFAULT_BLOCKED_CONTENT_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            virus_scanning_enabled: true,
            strip_metadata: true,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            upload_url_ttl: DEFAULT_UPLOAD_URL_TTL,
            upload_url_timeout: DEFAULT_UPLOAD_URL_TIMEOUT,
        }
    }

    /// Product imagery: raster images only, smaller files, larger resolution
    pub fn product_imagery() -> Self {
        Self {
            kind: PolicyKind::ProductImagery,
            max_size_bytes: 5 * MB,
            max_input_size_bytes: 10 * MB,
            allowed_mime_types: string_set(&["image/jpeg", "image/png", "image/webp"]),
            allowed_extensions: string_set(&["jpg", "jpeg", "png", "webp"]),
            max_image_dimensions: ImageDimensionCap {
                max_width: 4096,
                max_height: 4096,
            },
            max_input_pixels: 100_000_000,
            compression: CompressionSettings {
                enabled: true,
                quality_ladder: vec![90, 80, 70, 60, 50],
                target_ratio: DEFAULT_TARGET_RATIO,
            },
            ..Self::general()
        }
    }

    pub fn for_kind(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::General => Self::general(),
            PolicyKind::ProductImagery => Self::product_imagery(),
        }
    }

    /// Build the named policy, letting `{PREFIX}_*` environment variables
    /// override its defaults, then validate the result.
    pub fn from_env(kind: PolicyKind) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let prefix = kind.env_prefix();
        let mut policy = Self::for_kind(kind);

        if let Some(bytes) = parse_env_megabytes(prefix, "MAX_FILE_SIZE_MB")? {
            policy.max_size_bytes = bytes;
        }
        match parse_env_megabytes(prefix, "MAX_INPUT_SIZE_MB")? {
            Some(bytes) => policy.max_input_size_bytes = bytes,
            None => {
                policy.max_input_size_bytes =
                    policy.max_input_size_bytes.max(policy.max_size_bytes)
            }
        }
        if let Some(list) = env_value(prefix, "ALLOWED_EXTENSIONS") {
            policy.allowed_extensions = parse_list(&list);
        }
        if let Some(list) = env_value(prefix, "ALLOWED_CONTENT_TYPES") {
            policy.allowed_mime_types = parse_list(&list);
        }
        if let Some(width) = parse_env::<u32>(prefix, "MAX_IMAGE_WIDTH")? {
            policy.max_image_dimensions.max_width = width;
        }
        if let Some(height) = parse_env::<u32>(prefix, "MAX_IMAGE_HEIGHT")? {
            policy.max_image_dimensions.max_height = height;
        }
        if let Some(enabled) = parse_env::<bool>(prefix, "COMPRESSION_ENABLED")? {
            policy.compression.enabled = enabled;
        }
        if let Some(ladder) = env_value(prefix, "QUALITY_LADDER") {
            policy.compression.quality_ladder = ladder
                .split(',')
                .map(|s| {
                    s.trim().parse::<u8>().map_err(|_| ConfigError::InvalidValue {
                        key: format!("{}_QUALITY_LADDER", prefix),
                        value: ladder.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(enabled) = parse_env::<bool>(prefix, "VIRUS_SCANNING_ENABLED")? {
            policy.virus_scanning_enabled = enabled;
        }
        if let Some(secs) = parse_env::<u64>(prefix, "SCAN_TIMEOUT_SECS")? {
            policy.scan_timeout = Duration::from_secs(secs);
        }

        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size_bytes == 0 {
            return Err(ConfigError::InvalidPolicy(
                "max_size_bytes must be greater than zero".to_string(),
            ));
        }

        if self.max_input_size_bytes < self.max_size_bytes {
            return Err(ConfigError::InvalidPolicy(
                "max_input_size_bytes must not be below max_size_bytes".to_string(),
            ));
        }

        if self.allowed_mime_types.is_empty() || self.allowed_extensions.is_empty() {
            return Err(ConfigError::InvalidPolicy(
                "allow-lists must not be empty".to_string(),
            ));
        }

        if self.max_image_dimensions.max_width == 0 || self.max_image_dimensions.max_height == 0
        {
            return Err(ConfigError::InvalidPolicy(
                "max image dimensions must be greater than zero".to_string(),
            ));
        }

        let ladder = &self.compression.quality_ladder;
        if ladder.is_empty() {
            return Err(ConfigError::InvalidPolicy(
                "quality ladder must have at least one rung".to_string(),
            ));
        }
        if ladder.iter().any(|q| *q == 0 || *q > 100) {
            return Err(ConfigError::InvalidPolicy(
                "quality ladder rungs must be within 1..=100".to_string(),
            ));
        }
        if ladder.windows(2).any(|w| w[0] <= w[1]) {
            return Err(ConfigError::InvalidPolicy(
                "quality ladder must be strictly descending".to_string(),
            ));
        }

        let ratio = self.compression.target_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::InvalidPolicy(format!(
                "compression target ratio must be within (0, 1], got {}",
                ratio
            )));
        }

        for pattern in &self.blocked_content_patterns {
            regex::Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        }

        Ok(())
    }

    /// Limit on received bytes. Images that will be recompressed may arrive
    /// larger than `max_size_bytes`; their output is checked again later.
    pub fn received_size_limit(&self, recompressible: bool) -> usize {
        if recompressible && self.compression.enabled {
            self.max_input_size_bytes
        } else {
            self.max_size_bytes
        }
    }

    /// Received-size limit after applying a caller override, which can only
    /// tighten it.
    pub fn effective_size_limit(&self, size_override: Option<usize>, recompressible: bool) -> usize {
        let limit = self.received_size_limit(recompressible);
        match size_override {
            Some(requested) => requested.min(limit),
            None => limit,
        }
    }

    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.contains(&mime_type.to_lowercase())
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.contains(&extension.to_lowercase())
    }
}

fn env_value(prefix: &str, key: &str) -> Option<String> {
    env::var(format!("{}_{}", prefix, key))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(prefix: &str, key: &str) -> Result<Option<T>, ConfigError> {
    match env_value(prefix, key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: format!("{}_{}", prefix, key),
                value,
            }),
        None => Ok(None),
    }
}

/// A size given in megabytes, in bytes
fn parse_env_megabytes(prefix: &str, key: &str) -> Result<Option<usize>, ConfigError> {
    match parse_env::<usize>(prefix, key)? {
        Some(mb) => mb
            .checked_mul(MB)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: format!("{}_{}", prefix, key),
                value: mb.to_string(),
            }),
        None => Ok(None),
    }
}

fn parse_list(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_policies_are_valid() {
        assert!(ValidationPolicy::general().validate().is_ok());
        assert!(ValidationPolicy::product_imagery().validate().is_ok());
    }

    #[test]
    fn test_product_imagery_is_stricter_with_higher_resolution() {
        let general = ValidationPolicy::general();
        let product = ValidationPolicy::product_imagery();

        assert!(product.max_size_bytes < general.max_size_bytes);
        assert!(product.max_image_dimensions.max_width > general.max_image_dimensions.max_width);
        assert!(product
            .allowed_mime_types
            .iter()
            .all(|m| m.starts_with("image/")));
        assert!(!product.allows_extension("pdf"));
        assert!(general.allows_extension("PDF"));
    }

    #[test]
    fn test_rejects_ascending_ladder() {
        let mut policy = ValidationPolicy::general();
        policy.compression.quality_ladder = vec![50, 70];
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_rejects_empty_ladder_and_zero_size() {
        let mut policy = ValidationPolicy::general();
        policy.compression.quality_ladder.clear();
        assert!(policy.validate().is_err());

        let mut policy = ValidationPolicy::general();
        policy.max_size_bytes = 0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_rejects_invalid_pattern() {
        let mut policy = ValidationPolicy::general();
        policy.blocked_content_patterns.push("(unclosed".to_string());
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_size_override_only_tightens() {
        let policy = ValidationPolicy::general();
        assert_eq!(policy.effective_size_limit(None, false), policy.max_size_bytes);
        assert_eq!(policy.effective_size_limit(Some(1024), false), 1024);
        assert_eq!(
            policy.effective_size_limit(Some(policy.max_size_bytes * 4), false),
            policy.max_size_bytes
        );
        assert_eq!(
            policy.effective_size_limit(Some(policy.max_input_size_bytes * 4), true),
            policy.max_input_size_bytes
        );
    }

    #[test]
    fn test_recompressible_images_get_input_headroom() {
        let mut policy = ValidationPolicy::product_imagery();
        assert_eq!(policy.received_size_limit(true), 10 * MB);
        assert_eq!(policy.received_size_limit(false), 5 * MB);

        policy.compression.enabled = false;
        assert_eq!(policy.received_size_limit(true), 5 * MB);

        policy.max_input_size_bytes = MB;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_from_env_overrides() {
        // Unique prefix per kind keeps this independent of other tests.
        env::set_var("INTAKE_PRODUCT_MAX_FILE_SIZE_MB", "2");
        env::set_var("INTAKE_PRODUCT_QUALITY_LADDER", "80, 60, 40");
        env::set_var("INTAKE_PRODUCT_VIRUS_SCANNING_ENABLED", "false");

        let policy = ValidationPolicy::from_env(PolicyKind::ProductImagery).unwrap();
        assert_eq!(policy.max_size_bytes, 2 * MB);
        assert_eq!(policy.max_input_size_bytes, 10 * MB);
        assert_eq!(policy.compression.quality_ladder, vec![80, 60, 40]);
        assert!(!policy.virus_scanning_enabled);

        env::set_var("INTAKE_PRODUCT_MAX_FILE_SIZE_MB", "lots");
        assert!(matches!(
            ValidationPolicy::from_env(PolicyKind::ProductImagery),
            Err(ConfigError::InvalidValue { .. })
        ));

        env::remove_var("INTAKE_PRODUCT_MAX_FILE_SIZE_MB");
        env::remove_var("INTAKE_PRODUCT_QUALITY_LADDER");
        env::remove_var("INTAKE_PRODUCT_VIRUS_SCANNING_ENABLED");
    }

    #[test]
    fn test_from_env_rejects_overflowing_size() {
        env::set_var("INTAKE_GENERAL_MAX_FILE_SIZE_MB", usize::MAX.to_string());

        let result = ValidationPolicy::from_env(PolicyKind::General);
        env::remove_var("INTAKE_GENERAL_MAX_FILE_SIZE_MB");

        match result {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "INTAKE_GENERAL_MAX_FILE_SIZE_MB");
                assert_eq!(value, usize::MAX.to_string());
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }
}
