//! Dimension bounding and quality-ladder recompression

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};
use intake_core::{Dimensions, ValidationError, ValidationPolicy};
use std::io::Cursor;

use super::encoder::{ImageEncoder, LadderFormat};
use super::resize::ImageResize;
use crate::sniffer::is_raster_image;

/// Result of normalizing one image
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    /// Whether `bytes` differ from the input
    pub transformed: bool,
    pub original_dimensions: Option<Dimensions>,
    pub final_dimensions: Option<Dimensions>,
    /// Ladder rung that produced `bytes`, if any
    pub quality: Option<u8>,
}

impl NormalizedImage {
    fn unchanged(data: &[u8], dimensions: Option<Dimensions>) -> Self {
        Self {
            bytes: data.to_vec(),
            transformed: false,
            original_dimensions: dimensions,
            final_dimensions: dimensions,
            quality: None,
        }
    }
}

pub struct ImageNormalizer;

impl ImageNormalizer {
    /// Bound and recompress `data`, which the sniffer identified as `mime_type`.
    ///
    /// Formats the decoder cannot handle come back untouched. Output is a
    /// pure function of the input bytes and the policy.
    pub fn normalize(
        data: &[u8],
        mime_type: &str,
        policy: &ValidationPolicy,
    ) -> Result<NormalizedImage, ValidationError> {
        if !is_raster_image(mime_type) {
            tracing::debug!(mime_type = %mime_type, "Not a decodable raster image, passing through");
            return Ok(NormalizedImage::unchanged(data, None));
        }

        Self::normalize_raster(data, mime_type, policy).map_err(|e| {
            tracing::warn!(error = %e, mime_type = %mime_type, "Image normalization failed");
            ValidationError::ImageProcessingFailure {
                reason: e.to_string(),
            }
        })
    }

    fn normalize_raster(
        data: &[u8],
        mime_type: &str,
        policy: &ValidationPolicy,
    ) -> Result<NormalizedImage> {
        let format = ImageFormat::from_mime_type(mime_type)
            .ok_or_else(|| anyhow!("No decoder for {}", mime_type))?;

        let img = Self::decode(data, format, policy.max_input_pixels)?;
        let (width, height) = img.dimensions();
        let original_dimensions = Dimensions { width, height };

        let bounded = ImageResize::bound(&img, policy.max_image_dimensions);
        let resized = bounded.is_some();
        let img = bounded.unwrap_or(img);
        let (width, height) = img.dimensions();
        let final_dimensions = Dimensions { width, height };

        let Some(ladder_format) = LadderFormat::from_mime_type(mime_type) else {
            // No quality ladder for this format: bound only
            if !resized {
                return Ok(NormalizedImage::unchanged(data, Some(original_dimensions)));
            }
            let bytes = ImageEncoder::encode_as(&img, format)?;
            return Ok(NormalizedImage {
                bytes,
                transformed: true,
                original_dimensions: Some(original_dimensions),
                final_dimensions: Some(final_dimensions),
                quality: None,
            });
        };

        let target = Self::target_size(data.len(), policy);
        let (encoded, quality) =
            Self::run_ladder(&img, ladder_format, &policy.compression.quality_ladder, target)?;

        tracing::debug!(
            original_size = data.len(),
            encoded_size = encoded.len(),
            target_size = target,
            quality = quality,
            resized = resized,
            "Quality ladder finished"
        );

        // Never hand back something bigger than what we were given
        if !resized && encoded.len() >= data.len() {
            let bytes = if policy.strip_metadata {
                ImageEncoder::strip_exif(data, mime_type)?.unwrap_or_else(|| data.to_vec())
            } else {
                data.to_vec()
            };
            let transformed = bytes.as_slice() != data;
            return Ok(NormalizedImage {
                bytes,
                transformed,
                original_dimensions: Some(original_dimensions),
                final_dimensions: Some(original_dimensions),
                quality: None,
            });
        }

        Ok(NormalizedImage {
            bytes: encoded,
            transformed: true,
            original_dimensions: Some(original_dimensions),
            final_dimensions: Some(final_dimensions),
            quality: Some(quality),
        })
    }

    /// Decode with a pixel budget checked against the header first
    fn decode(data: &[u8], format: ImageFormat, max_pixels: u64) -> Result<DynamicImage> {
        let (width, height) = ImageReader::with_format(Cursor::new(data), format)
            .into_dimensions()
            .context("Failed to read image header")?;

        let pixels = width as u64 * height as u64;
        if pixels > max_pixels {
            return Err(anyhow!(
                "Image has {} pixels, limit is {}",
                pixels,
                max_pixels
            ));
        }

        // Worst case is 16 bytes per pixel (RGBA, 32-bit float)
        let mut limits = Limits::default();
        limits.max_alloc = Some(max_pixels.saturating_mul(16));

        let mut reader = ImageReader::with_format(Cursor::new(data), format);
        reader.limits(limits);
        reader.decode().context("Failed to decode image")
    }

    /// Byte budget a recompressed image should meet
    pub fn target_size(original_size: usize, policy: &ValidationPolicy) -> usize {
        let ratio_target =
            (original_size as f64 * policy.compression.target_ratio as f64).floor() as usize;
        ratio_target.min(policy.max_size_bytes)
    }

    /// Walk the ladder from the highest rung down. Returns the first encoding
    /// within `target`, or the last rung's if none fits.
    fn run_ladder(
        img: &DynamicImage,
        format: LadderFormat,
        ladder: &[u8],
        target: usize,
    ) -> Result<(Vec<u8>, u8)> {
        let mut last = None;

        for &quality in ladder {
            let encoded = ImageEncoder::encode(img, format, quality)
                .with_context(|| format!("Failed to encode {:?} at quality {}", format, quality))?;

            if encoded.len() <= target {
                return Ok((encoded, quality));
            }
            last = Some((encoded, quality));
        }

        last.ok_or_else(|| anyhow!("Quality ladder is empty"))
    }
}
