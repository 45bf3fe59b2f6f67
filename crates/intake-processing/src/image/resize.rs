use image::{DynamicImage, GenericImageView};
use intake_core::ImageDimensionCap;

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Largest dimensions that fit inside `cap` with the original aspect
    /// ratio. `None` when the image already fits; images are never upscaled.
    pub fn bounded_dimensions(
        width: u32,
        height: u32,
        cap: ImageDimensionCap,
    ) -> Option<(u32, u32)> {
        if width <= cap.max_width && height <= cap.max_height {
            return None;
        }

        let scale = (cap.max_width as f64 / width as f64).min(cap.max_height as f64 / height as f64);
        let new_width = ((width as f64 * scale).round() as u32).clamp(1, cap.max_width);
        let new_height = ((height as f64 * scale).round() as u32).clamp(1, cap.max_height);

        Some((new_width, new_height))
    }

    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> image::imageops::FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            image::imageops::FilterType::Triangle
        } else if max_ratio > 1.5 {
            image::imageops::FilterType::CatmullRom
        } else {
            image::imageops::FilterType::Lanczos3
        }
    }

    /// Downscale `img` to fit `cap`, or `None` if it already fits
    pub fn bound(img: &DynamicImage, cap: ImageDimensionCap) -> Option<DynamicImage> {
        let (orig_width, orig_height) = img.dimensions();
        let (width, height) = Self::bounded_dimensions(orig_width, orig_height, cap)?;

        let filter = Self::select_filter(orig_width, orig_height, width, height);
        tracing::debug!(
            from_width = orig_width,
            from_height = orig_height,
            to_width = width,
            to_height = height,
            filter = ?filter,
            "Bounding image dimensions"
        );

        Some(img.resize_exact(width, height, filter))
    }
}
