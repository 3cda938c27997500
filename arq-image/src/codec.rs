//! Image codec boundary the engine treats as opaque payload bytes (§4.7).
//!
//! Stands in for the original system's AVIF codec at the same seam: a pure-Rust
//! dependency tree can provide a JPEG encoder without vendoring a native AVIF binding,
//! so `image`'s JPEG support is substituted here. Swapping in a real AVIF crate later
//! only touches this file.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use crate::error::ImageCodecError;

/// Default JPEG quality (1..=100) used when the caller has no preference.
pub const DEFAULT_QUALITY: u8 = 80;

/// Re-encode `pixels` as a JPEG byte blob at the given quality.
pub fn encode(pixels: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageCodecError> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder
        .encode(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(ImageCodecError::Encode)?;
    Ok(out)
}

/// Decode an arbitrary supported image format back to an RGB8 pixel buffer.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, ImageCodecError> {
    image::load_from_memory(bytes)
        .map_err(ImageCodecError::Decode)
        .map(|img| img.to_rgb8())
}

/// Decode bytes known to be in a specific format, skipping format sniffing.
pub fn decode_as(bytes: &[u8], format: ImageFormat) -> Result<RgbImage, ImageCodecError> {
    image::load_from_memory_with_format(bytes, format)
        .map_err(ImageCodecError::Decode)
        .map(|img| img.to_rgb8())
}
