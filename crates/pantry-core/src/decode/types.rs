//! Core types for image decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// The source carried no bytes at all.
    #[error("Empty image file")]
    Empty,
}

/// Filter type for image resizing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    #[default]
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (flip horizontal + rotate 270 CW).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (flip horizontal + rotate 90 CW).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// A file picked by the user, held only for one pipeline run.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Raw file bytes as read from the file input.
    pub bytes: Vec<u8>,
    /// MIME type declared by the browser (may be empty or wrong).
    pub mime: String,
    /// Original file name, if the picker reported one.
    pub file_name: Option<String>,
}

impl SourceImage {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.file_name = if name.is_empty() { None } else { Some(name) };
        self
    }
}

/// Channel layout of a decoded pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    /// 3 bytes per pixel
    #[default]
    Rgb,
    /// 4 bytes per pixel, straight (not premultiplied) alpha
    Rgba,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }
}

/// A decoded image with RGB or RGBA pixel data.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Pixel data in row-major order.
    /// Length should be width * height * layout.channels().
    pub pixels: Vec<u8>,
    /// Whether `pixels` carries an alpha channel.
    pub layout: PixelLayout,
}

impl DecodedImage {
    /// Create a new RGB DecodedImage with the given dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            (width as usize) * (height as usize) * 3,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
            layout: PixelLayout::Rgb,
        }
    }

    /// Create a new RGBA DecodedImage.
    pub fn new_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            (width as usize) * (height as usize) * 4,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
            layout: PixelLayout::Rgba,
        }
    }

    /// Create a DecodedImage from an image::RgbImage.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
            layout: PixelLayout::Rgb,
        }
    }

    /// Create a DecodedImage from an image::RgbaImage.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
            layout: PixelLayout::Rgba,
        }
    }

    /// Borrow the pixels as an RGB view. `None` for RGBA buffers or a size mismatch.
    pub fn as_rgb_view(&self) -> Option<image::ImageBuffer<image::Rgb<u8>, &[u8]>> {
        match self.layout {
            PixelLayout::Rgb => image::ImageBuffer::from_raw(self.width, self.height, self.pixels.as_slice()),
            PixelLayout::Rgba => None,
        }
    }

    /// Borrow the pixels as an RGBA view. `None` for RGB buffers or a size mismatch.
    pub fn as_rgba_view(&self) -> Option<image::ImageBuffer<image::Rgba<u8>, &[u8]>> {
        match self.layout {
            PixelLayout::Rgba => image::ImageBuffer::from_raw(self.width, self.height, self.pixels.as_slice()),
            PixelLayout::Rgb => None,
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.layout == PixelLayout::Rgba
    }

    /// Composite onto opaque black and drop the alpha channel.
    ///
    /// RGB images are returned as a plain copy.
    pub fn flatten_alpha(&self) -> DecodedImage {
        if !self.has_alpha() {
            return self.clone();
        }

        let pixels = self
            .pixels
            .chunks_exact(4)
            .flat_map(|px| {
                let a = px[3] as u16;
                let over_black = |c: u8| ((c as u16 * a + 127) / 255) as u8;
                [over_black(px[0]), over_black(px[1]), over_black(px[2])]
            })
            .collect();

        DecodedImage {
            width: self.width,
            height: self.height,
            pixels,
            layout: PixelLayout::Rgb,
        }
    }

    /// Dimensions as a `(width, height)` pair.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}
