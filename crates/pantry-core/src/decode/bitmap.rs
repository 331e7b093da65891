//! Bitmap decoding with EXIF orientation handling.
//!
//! The format is sniffed from the bytes rather than trusted from the
//! declared MIME type, so a mislabelled upload still decodes when the
//! `image` crate recognizes it.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::DynamicImage;
use image::ImageReader;

use super::{DecodeError, DecodedImage, Orientation};

/// Decode JPEG or PNG bytes into an upright bitmap.
///
/// Sources with an alpha channel decode to RGBA, everything else to RGB.
///
/// # Errors
///
/// Returns `DecodeError::Empty` for zero-length input,
/// `DecodeError::InvalidFormat` when no decoder recognizes the bytes and
/// `DecodeError::CorruptedFile` when the recognized decoder fails.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let orientation = extract_orientation(bytes);

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let img = apply_orientation(img, orientation);
    if img.color().has_alpha() {
        Ok(DecodedImage::from_rgba_image(img.into_rgba8()))
    } else {
        Ok(DecodedImage::from_rgb_image(img.into_rgb8()))
    }
}

/// Extract EXIF orientation from the container.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined.
fn extract_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

/// Apply EXIF orientation transformation to an image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
