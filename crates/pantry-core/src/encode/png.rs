//! Lossless PNG encoding, used only for the first attempt on PNG sources.

use image::codecs::png::PngEncoder;
use image::ExtendedColorType;
use image::ImageEncoder;
use std::io::Cursor;

use super::{validate_pixels, EncodeError};
use crate::decode::PixelLayout;

/// Encode RGB or RGBA pixel data to PNG bytes.
pub fn encode_png(
    pixels: &[u8],
    width: u32,
    height: u32,
    layout: PixelLayout,
) -> Result<Vec<u8>, EncodeError> {
    validate_pixels(pixels, width, height, layout)?;

    let color = match layout {
        PixelLayout::Rgb => ExtendedColorType::Rgb8,
        PixelLayout::Rgba => ExtendedColorType::Rgba8,
    };

    let mut buffer = Cursor::new(Vec::new());
    PngEncoder::new(&mut buffer)
        .write_image(pixels, width, height, color)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_encode_png_signature() {
        let pixels = vec![200u8; 16 * 9 * 3];
        let png = encode_png(&pixels, 16, 9, PixelLayout::Rgb).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn test_encode_png_roundtrip_dimensions() {
        let pixels = vec![10u8; 7 * 3 * 3];
        let png = encode_png(&pixels, 7, 3, PixelLayout::Rgb).unwrap();

        let decoded = crate::decode::decode_image(&png).unwrap();
        assert_eq!(decoded.dimensions(), (7, 3));
        assert_eq!(decoded.pixels, pixels);
    }

    #[test]
    fn test_encode_png_rgba_keeps_alpha() {
        let pixels = [10u8, 20, 30, 0, 40, 50, 60, 255].repeat(4);
        let png = encode_png(&pixels, 4, 2, PixelLayout::Rgba).unwrap();

        let decoded = crate::decode::decode_image(&png).unwrap();
        assert!(decoded.has_alpha());
        assert_eq!(decoded.pixels, pixels);
    }

    #[test]
    fn test_encode_png_rejects_short_buffer() {
        let result = encode_png(&[0u8; 5], 2, 2, PixelLayout::Rgb);
        assert!(matches!(result, Err(EncodeError::InvalidPixelData { .. })));
    }
}
