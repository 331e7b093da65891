//! Image decoding WASM bindings.
//!
//! # Functions
//!
//! - [`decode_image`] - Decode a JPEG or PNG file, applying EXIF orientation
//! - [`fit_dimensions`] - Compute the size an image is bounded to before upload
//!
//! # Example
//!
//! ```typescript
//! import { decode_image, fit_dimensions } from '@pantry/wasm';
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const image = decode_image(bytes);
//! const [w, h] = fit_dimensions(image.width, image.height, 900);
//! ```

use crate::types::JsDecodedImage;
use pantry_core::decode;
use wasm_bindgen::prelude::*;

/// Decode a JPEG or PNG image from bytes.
///
/// The format is sniffed from the bytes, not taken from the file name or
/// declared type. EXIF orientation is applied.
///
/// # Errors
///
/// Returns an error if the bytes are empty, in an unsupported format, or
/// corrupted.
#[wasm_bindgen]
pub fn decode_image(bytes: &[u8]) -> Result<JsDecodedImage, JsValue> {
    decode::decode_image(bytes)
        .map(JsDecodedImage::from_decoded)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Bound `width`x`height` so neither side exceeds `max_dim`, keeping the
/// aspect ratio. Returns `[width, height]`.
#[wasm_bindgen]
pub fn fit_dimensions(width: u32, height: u32, max_dim: u32) -> Vec<u32> {
    let (w, h) = decode::fit_within(width, height, max_dim);
    vec![w, h]
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_decode_image_empty() {
        assert!(decode_image(&[]).is_err());
    }

    #[wasm_bindgen_test]
    fn test_decode_image_garbage() {
        assert!(decode_image(&[0x00, 0x01, 0x02, 0x03]).is_err());
    }
}
