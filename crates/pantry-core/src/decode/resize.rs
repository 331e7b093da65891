//! Resampling and dimension arithmetic for upload normalization.
//!
//! Every resize starts from the decoded source so repeated shrink steps
//! never compound resampling blur.

use super::{DecodeError, DecodedImage, FilterType, PixelLayout};

/// Resize an image to exact dimensions.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` for zero target dimensions or a
/// pixel buffer that does not match the declared size.
pub fn resize(
    image: &DecodedImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidFormat);
    }

    // Fast path: if dimensions match, just clone
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }

    let mismatch = || DecodeError::CorruptedFile("Pixel buffer size mismatch".to_string());
    let filter = filter.to_image_filter();

    match image.layout {
        PixelLayout::Rgb => {
            let view = image.as_rgb_view().ok_or_else(mismatch)?;
            let resized = image::imageops::resize(&view, width, height, filter);
            Ok(DecodedImage::from_rgb_image(resized))
        }
        PixelLayout::Rgba => {
            let view = image.as_rgba_view().ok_or_else(mismatch)?;
            let resized = image::imageops::resize(&view, width, height, filter);
            Ok(DecodedImage::from_rgba_image(resized))
        }
    }
}

/// Dimensions that fit inside a `max_dim` square, preserving aspect ratio.
///
/// Sources already within bounds are returned unchanged. Otherwise the
/// longer side becomes `max_dim` and the other is scaled and rounded.
pub fn fit_within(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    if width <= max_dim && height <= max_dim {
        return (width, height);
    }

    if width > height {
        let scaled = (height as f64 * (max_dim as f64 / width as f64)).round() as u32;
        (max_dim, scaled.max(1))
    } else {
        let scaled = (width as f64 * (max_dim as f64 / height as f64)).round() as u32;
        (scaled.max(1), max_dim)
    }
}

/// Scale both dimensions by `factor`, rounding each and never reaching zero.
pub fn shrink(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let w = (width as f64 * factor).round() as u32;
    let h = (height as f64 * factor).round() as u32;
    (w.max(1), h.max(1))
}
