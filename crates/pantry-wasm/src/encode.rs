//! Image normalization WASM bindings.
//!
//! # Functions
//!
//! - [`normalize_image`] - Decode, bound and re-encode a picked file under the byte budget
//! - [`to_data_uri`] - Render bytes as a base64 `data:` URI
//!
//! # Example
//!
//! ```typescript
//! import { normalize_image } from '@pantry/wasm';
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const normalized = normalize_image(bytes, file.type, { target_bytes: 300000 });
//! preview.src = normalized.toDataUri();
//! ```

use crate::types::{config_from_js, JsNormalizedImage};
use pantry_core::{decode_image, encode, search_encoding, OutputFormat, PipelineConfig};
use wasm_bindgen::prelude::*;

/// Run the decode and encoding search without uploading.
///
/// `config` is an optional plain object with any `PipelineConfig` fields;
/// omitted fields take their defaults.
///
/// # Errors
///
/// Returns an error if the config is malformed, the bytes cannot be
/// decoded, or encoding fails.
#[wasm_bindgen]
pub fn normalize_image(bytes: &[u8], mime: &str, config: JsValue) -> Result<JsNormalizedImage, JsValue> {
    let config = config_from_js(config)?;
    normalize(bytes, mime, &config)
        .map(JsNormalizedImage::from_artifact)
        .map_err(|e| JsValue::from_str(&e))
}

fn normalize(bytes: &[u8], mime: &str, config: &PipelineConfig) -> Result<pantry_core::EncodedArtifact, String> {
    let decoded = decode_image(bytes).map_err(|e| e.to_string())?;
    search_encoding(&decoded, OutputFormat::for_source_mime(mime), config).map_err(|e| e.to_string())
}

/// Render bytes as a base64 `data:` URI. An empty `mime` becomes
/// `application/octet-stream`.
#[wasm_bindgen]
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    encode::to_data_uri(mime, bytes)
}
