//! Pantry WASM - WebAssembly bindings for the recipe image pipeline
//!
//! This crate exposes the pantry-core pipeline to the recipe web client.
//!
//! # Module Structure
//!
//! - `uploader` - `ImageUploader`, the form's image slot with normalize + upload
//! - `decode` - Image decoding bindings
//! - `encode` - Normalization (decode + encoding search) without upload
//! - `session` - `localStorage` session and `Date.now()` clock
//! - `view` - JS callbacks for the busy indicator and alerts
//! - `logging` - `tracing` to browser console
//!
//! # Usage
//!
//! ```typescript
//! import init, { ImageUploader } from '@pantry/wasm';
//!
//! await init();
//! const uploader = new ImageUploader(undefined, callbacks);
//! const image = await uploader.selectFile(bytes, file.type, file.name);
//! ```

use wasm_bindgen::prelude::*;

mod decode;
mod encode;
mod logging;
mod session;
mod types;
mod uploader;
mod view;

pub use decode::{decode_image, fit_dimensions};
pub use encode::{normalize_image, to_data_uri};
pub use logging::{install_console_logging, ConsoleLayer, ConsoleWriter};
pub use session::{JsClock, LocalStorageSession};
pub use types::{JsDecodedImage, JsNormalizedImage};
pub use uploader::ImageUploader;
pub use view::JsView;

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    install_console_logging(ConsoleLayer::browser(tracing::Level::INFO));
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
