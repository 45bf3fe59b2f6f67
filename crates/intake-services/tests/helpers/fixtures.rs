use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Plain ASCII payload carrying the EICAR test signature
pub const EICAR: &[u8] =
    br"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// Hash of a pixel position; looks like noise to every encoder
fn noise(x: u32, y: u32) -> u64 {
    let mut z = ((y as u64) << 32 | x as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn noise_pixel(x: u32, y: u32) -> Rgb<u8> {
    let v = noise(x, y);
    Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
}

/// Incompressible RGB image
pub fn noisy_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, noise_pixel))
}

/// Flat grey image whose first `noisy_rows` rows are noise.
///
/// Encoded size is roughly `width * noisy_rows * 3` bytes as PNG.
pub fn banded_image(width: u32, height: u32, noisy_rows: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        if y < noisy_rows {
            noise_pixel(x, y)
        } else {
            Rgb([128, 128, 128])
        }
    }))
}

pub fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let img = match format {
        ImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => img.clone(),
    };
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format)
        .expect("Failed to encode fixture");
    buffer
}

/// PNG written with the fast deflate path, for large fixtures
pub fn encode_png_fast(img: &DynamicImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buffer, CompressionType::Fast, FilterType::Sub);
    img.write_with_encoder(encoder)
        .expect("Failed to encode PNG fixture");
    buffer
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    img.write_with_encoder(encoder)
        .expect("Failed to encode JPEG fixture");
    buffer
}

pub fn png(width: u32, height: u32) -> Bytes {
    Bytes::from(encode(&noisy_image(width, height), ImageFormat::Png))
}

pub fn jpeg(width: u32, height: u32) -> Bytes {
    Bytes::from(encode_jpeg(&noisy_image(width, height), 90))
}

pub fn gif(width: u32, height: u32) -> Bytes {
    Bytes::from(encode(&noisy_image(width, height), ImageFormat::Gif))
}

/// Just enough of a PE header for signature detection
pub fn windows_executable() -> Bytes {
    let mut data = b"MZ\x90\x00\x03\x00\x00\x00\x04\x00\x00\x00\xFF\xFF\x00\x00".to_vec();
    data.extend_from_slice(&[0u8; 48]);
    data.extend_from_slice(b"This program cannot be run in DOS mode.");
    Bytes::from(data)
}
