//! Image normalization
//!
//! Bounds raster images to the policy's dimension cap and recompresses them
//! along a quality ladder:
//! - Dimension bounding (resize)
//! - Per-format encoders (encoder)
//! - Ladder search and the no-inflation rule (normalizer)

pub mod encoder;
pub mod normalizer;
pub mod resize;

pub use encoder::{ImageEncoder, LadderFormat};
pub use normalizer::{ImageNormalizer, NormalizedImage};
pub use resize::ImageResize;
