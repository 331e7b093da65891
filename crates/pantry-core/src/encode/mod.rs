//! Image encoding for uploads.
//!
//! This module provides:
//! - JPEG encoding with a quality parameter
//! - PNG encoding (RGB or RGBA) for sources that already fit the byte budget
//! - Alpha flattening onto black when a transparent source becomes JPEG
//! - `data:` URI rendering for the inline fallback result

mod jpeg;
mod png;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::{DecodedImage, PixelLayout};

pub use jpeg::encode_jpeg;
pub use png::encode_png;

/// Errors that can occur during encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes for the image size, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The underlying encoder failed
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// Resampling before encoding failed
    #[error("Resize failed: {0}")]
    Resize(#[from] crate::decode::DecodeError),
}

/// Output container of an encoding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// PNG for PNG sources, JPEG for everything else.
    pub fn for_source_mime(mime: &str) -> Self {
        if mime.eq_ignore_ascii_case("image/png") {
            OutputFormat::Png
        } else {
            OutputFormat::Jpeg
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    /// Whether the quality parameter changes the output at all.
    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Jpeg)
    }
}

/// Encode a bitmap in the requested format. `quality` is ignored for PNG.
///
/// PNG keeps an alpha channel; JPEG output composites it onto black first.
pub fn encode(image: &DecodedImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, EncodeError> {
    match format {
        OutputFormat::Jpeg if image.has_alpha() => {
            let flat = image.flatten_alpha();
            encode_jpeg(&flat.pixels, flat.width, flat.height, quality)
        }
        OutputFormat::Jpeg => encode_jpeg(&image.pixels, image.width, image.height, quality),
        OutputFormat::Png => encode_png(&image.pixels, image.width, image.height, image.layout),
    }
}

/// Render bytes as a base64 `data:` URI.
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    let mime = if mime.is_empty() {
        "application/octet-stream"
    } else {
        mime
    };
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

pub(crate) fn validate_pixels(
    pixels: &[u8],
    width: u32,
    height: u32,
    layout: PixelLayout,
) -> Result<(), EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected = (width as usize) * (height as usize) * layout.channels();
    if pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}
