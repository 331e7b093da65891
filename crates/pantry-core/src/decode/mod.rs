//! Image decoding for the upload pipeline.
//!
//! This module provides functionality for:
//! - Decoding JPEG and PNG files picked by the user
//! - Correcting EXIF orientation so phone photos upload upright
//! - Computing bounded dimensions and resampling
//!
//! All operations are synchronous; in the browser they run on the main
//! thread between the file read and the upload request.

mod bitmap;
mod resize;
mod types;

pub use bitmap::decode_image;
pub use resize::{fit_within, resize, shrink};
pub use types::{DecodeError, DecodedImage, FilterType, Orientation, PixelLayout, SourceImage};

#[cfg(test)]
pub(crate) use bitmap::tests::{png_bytes, transparent_png_bytes, MINIMAL_JPEG};
