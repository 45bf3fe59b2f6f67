use anyhow::{anyhow, Result};
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat};
use img_parts::{jpeg::Jpeg, png::Png, webp::WebP, ImageEXIF};
use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Formats recompressed along the quality ladder. The source format is always
/// kept; a PNG never comes back as a JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderFormat {
    Jpeg,
    Png,
    WebP,
}

impl LadderFormat {
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/jpeg" => Some(LadderFormat::Jpeg),
            "image/png" => Some(LadderFormat::Png),
            "image/webp" => Some(LadderFormat::WebP),
            _ => None,
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            LadderFormat::Jpeg => "image/jpeg",
            LadderFormat::Png => "image/png",
            LadderFormat::WebP => "image/webp",
        }
    }
}

/// Bits kept per color channel for a PNG quality rung. The top rung is lossless.
pub fn png_color_bits(quality: u8) -> u8 {
    match quality {
        85..=100 => 8,
        70..=84 => 6,
        55..=69 => 5,
        _ => 4,
    }
}

/// libwebp effort, 0 (fast) to 6 (smallest output)
const WEBP_METHOD: i32 = 6;

pub struct ImageEncoder;

impl ImageEncoder {
    /// Encode `img` as `format` at `quality` (1-100)
    pub fn encode(img: &DynamicImage, format: LadderFormat, quality: u8) -> Result<Vec<u8>> {
        match format {
            LadderFormat::Jpeg => Self::encode_jpeg(img, quality),
            LadderFormat::Png => Self::encode_png(img, quality),
            LadderFormat::WebP => Self::encode_webp(img, quality),
        }
    }

    /// Compress to JPEG using mozjpeg
    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        // libjpeg reports fatal errors by unwinding
        catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
            let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
            comp.set_size(width as usize, height as usize);
            comp.set_quality(quality as f32);
            comp.set_progressive_mode();
            comp.set_optimize_coding(true);

            let mut comp = comp.start_compress(Vec::new())?;
            comp.write_scanlines(&rgb_img)?;
            comp.finish()
        }))
        .map_err(|_| anyhow!("JPEG encoder aborted"))?
        .map_err(Into::into)
    }

    /// Compress to PNG, reducing color depth below the top rung
    fn encode_png(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let reduced = posterize(img, png_color_bits(quality));

        let mut buffer = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut buffer,
            CompressionType::Best,
            PngFilterType::Adaptive,
        );
        reduced.write_with_encoder(encoder)?;

        Ok(buffer)
    }

    /// Compress to WebP (lossy) at the slowest method, with sharp RGB to YUV
    /// conversion to keep chroma edges
    fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let (width, height) = img.dimensions();

        let mut config =
            webp::WebPConfig::new().map_err(|_| anyhow!("Failed to initialize WebP config"))?;
        config.quality = quality as f32;
        config.method = WEBP_METHOD;
        config.use_sharp_yuv = 1;

        let webp_data = if img.color().has_alpha() {
            let rgba_img = img.to_rgba8();
            webp::Encoder::from_rgba(&rgba_img, width, height).encode_advanced(&config)
        } else {
            let rgb_img = img.to_rgb8();
            webp::Encoder::from_rgb(&rgb_img, width, height).encode_advanced(&config)
        }
        .map_err(|e| anyhow!("WebP encoding failed: {:?}", e))?;

        Ok(webp_data.to_vec())
    }

    /// Re-encode in `format` with the codec's defaults. Used for bounded
    /// images whose format has no quality ladder (GIF, BMP, TIFF).
    pub fn encode_as(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
        let img = match format {
            ImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8()),
            _ => to_eight_bit(img),
        };

        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format)?;
        Ok(buffer)
    }

    /// Remove the EXIF segment from an encoded image without re-encoding it.
    ///
    /// Returns `None` for formats without an EXIF container we can edit.
    pub fn strip_exif(data: &[u8], mime_type: &str) -> Result<Option<Vec<u8>>> {
        match mime_type {
            "image/jpeg" => {
                let mut jpeg = Jpeg::from_bytes(data.to_vec().into())
                    .map_err(|e| anyhow!("Failed to parse image container: {:?}", e))?;
                jpeg.set_exif(None);
                Ok(Some(jpeg.encoder().bytes().to_vec()))
            }
            "image/png" => {
                let mut png = Png::from_bytes(data.to_vec().into())
                    .map_err(|e| anyhow!("Failed to parse image container: {:?}", e))?;
                png.set_exif(None);
                Ok(Some(png.encoder().bytes().to_vec()))
            }
            "image/webp" => {
                let mut webp = WebP::from_bytes(data.to_vec().into())
                    .map_err(|e| anyhow!("Failed to parse image container: {:?}", e))?;
                webp.set_exif(None);
                Ok(Some(webp.encoder().bytes().to_vec()))
            }
            _ => Ok(None),
        }
    }
}

/// Convert to an 8-bit buffer with the same channel layout
fn to_eight_bit(img: &DynamicImage) -> DynamicImage {
    match img.color() {
        ColorType::L8 | ColorType::L16 => DynamicImage::ImageLuma8(img.to_luma8()),
        ColorType::La8 | ColorType::La16 => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
        color if color.has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

/// Keep the top `bits` of every color sample. Alpha is left alone.
fn posterize(img: &DynamicImage, bits: u8) -> DynamicImage {
    let mut out = to_eight_bit(img);
    if bits >= 8 {
        return out;
    }

    match &mut out {
        DynamicImage::ImageLuma8(buf) => posterize_samples(buf, 1, false, bits),
        DynamicImage::ImageLumaA8(buf) => posterize_samples(buf, 2, true, bits),
        DynamicImage::ImageRgb8(buf) => posterize_samples(buf, 3, false, bits),
        DynamicImage::ImageRgba8(buf) => posterize_samples(buf, 4, true, bits),
        _ => {}
    }

    out
}

fn posterize_samples(samples: &mut [u8], channels: usize, has_alpha: bool, bits: u8) {
    let mask = 0xFFu8 << (8 - bits);
    for (i, sample) in samples.iter_mut().enumerate() {
        if has_alpha && i % channels == channels - 1 {
            continue;
        }
        // Replicate the kept bits downwards so full intensity stays 255
        let kept = *sample & mask;
        *sample = kept | (kept >> bits);
    }
}
