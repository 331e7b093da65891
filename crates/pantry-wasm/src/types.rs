//! WASM-compatible wrapper types.
//!
//! These wrap the core pipeline types and handle the conversion between
//! Rust and JavaScript representations.

use pantry_core::{DecodedImage, EncodedArtifact, PipelineConfig};
use wasm_bindgen::prelude::*;

/// A decoded image wrapper for JavaScript.
///
/// The pixel data stays in WASM memory; `pixels()` copies it out as a
/// `Uint8Array`. Images with transparency keep four bytes per pixel.
#[wasm_bindgen]
pub struct JsDecodedImage {
    width: u32,
    height: u32,
    has_alpha: bool,
    pixels: Vec<u8>,
}

#[wasm_bindgen]
impl JsDecodedImage {
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether `pixels()` is RGBA rather than RGB.
    #[wasm_bindgen(getter, js_name = hasAlpha)]
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Get the number of bytes in the pixel buffer (3 or 4 per pixel)
    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.pixels.len()
    }

    /// Returns RGB or RGBA pixel data as Uint8Array (copied).
    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.clone()
    }
}

impl JsDecodedImage {
    pub(crate) fn from_decoded(img: DecodedImage) -> Self {
        Self {
            width: img.width,
            height: img.height,
            has_alpha: img.has_alpha(),
            pixels: img.pixels,
        }
    }
}

/// The encoding the search settled on, before any upload.
#[wasm_bindgen]
pub struct JsNormalizedImage {
    artifact: EncodedArtifact,
}

#[wasm_bindgen]
impl JsNormalizedImage {
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.artifact.params.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.artifact.params.height
    }

    /// JPEG quality in percent; meaningless for PNG output.
    #[wasm_bindgen(getter)]
    pub fn quality(&self) -> u8 {
        self.artifact.params.quality
    }

    #[wasm_bindgen(getter)]
    pub fn mime(&self) -> String {
        self.artifact.mime().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn attempts(&self) -> u32 {
        self.artifact.attempts
    }

    /// Whether the bytes fit the configured budget.
    #[wasm_bindgen(getter, js_name = withinTarget)]
    pub fn within_target(&self) -> bool {
        self.artifact.within_target
    }

    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.artifact.len()
    }

    /// Encoded bytes as Uint8Array (copied).
    pub fn bytes(&self) -> Vec<u8> {
        self.artifact.bytes.clone()
    }

    /// The bytes as a base64 `data:` URI, ready for an `<img>` preview.
    #[wasm_bindgen(js_name = toDataUri)]
    pub fn to_data_uri(&self) -> String {
        self.artifact.to_data_uri()
    }
}

impl JsNormalizedImage {
    pub(crate) fn from_artifact(artifact: EncodedArtifact) -> Self {
        Self { artifact }
    }
}

/// Read a pipeline configuration from a plain JS object.
///
/// `undefined` and `null` give the defaults; omitted fields take their
/// default values. Out-of-range values are rejected with an error string.
pub(crate) fn config_from_js(value: JsValue) -> Result<PipelineConfig, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(PipelineConfig::default());
    }
    let config: PipelineConfig =
        serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    config
        .validate()
        .map_err(|e| JsValue::from_str(&format!("Invalid pipeline config: {e}")))?;
    Ok(config)
}
