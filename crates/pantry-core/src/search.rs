//! Byte-budget search over encoder quality and output dimensions.
//!
//! The search has two phases:
//!
//! 1. **Quality search**: re-encode as JPEG at decreasing quality while the
//!    output is over budget and quality is above the floor. PNG sources
//!    switch to JPEG on the first retry since PNG has no quality lever.
//! 2. **Dimension search**: once quality bottoms out, shrink both sides by
//!    the configured factor and re-encode while still over budget and
//!    either side exceeds the minimum dimension.
//!
//! Both loops stop at their floors, so the result is best-effort: an
//! image full of fine detail can still come out over budget. Callers get
//! that fact through [`EncodedArtifact::within_target`].

use serde::Serialize;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::decode::{fit_within, resize, shrink, DecodedImage};
use crate::encode::{encode, to_data_uri, EncodeError, OutputFormat};

/// Parameters of a single encoding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodingParams {
    pub width: u32,
    pub height: u32,
    /// Quality in percent; ignored for PNG
    pub quality: u8,
    pub format: OutputFormat,
}

/// The attempt the search settled on.
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub params: EncodingParams,
    pub bytes: Vec<u8>,
    /// Number of encodes performed, including the first one
    pub attempts: u32,
    /// Whether `bytes` fits the configured budget
    pub within_target: bool,
}

impl EncodedArtifact {
    pub fn mime(&self) -> &'static str {
        self.params.format.mime()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_data_uri(&self) -> String {
        to_data_uri(self.mime(), &self.bytes)
    }
}

/// Run the search against a decoded bitmap with the real resampler and encoders.
///
/// Each attempt resamples from `image` itself, never from a previous
/// attempt's output.
pub fn search_encoding(
    image: &DecodedImage,
    source_format: OutputFormat,
    config: &PipelineConfig,
) -> Result<EncodedArtifact, EncodeError> {
    let mut scaled: Option<DecodedImage> = None;

    search_encoding_with(image.dimensions(), source_format, config, |params| {
        let bitmap = match scaled.take() {
            Some(s) if s.dimensions() == (params.width, params.height) => s,
            _ => resize(image, params.width, params.height, config.filter)?,
        };
        let encoded = encode(&bitmap, params.format, params.quality);
        scaled = Some(bitmap);
        encoded
    })
}

/// The search itself, independent of any pixel data.
///
/// `encode_fn` produces the bytes for a set of parameters; the search only
/// looks at their length.
pub fn search_encoding_with<F>(
    source: (u32, u32),
    source_format: OutputFormat,
    config: &PipelineConfig,
    mut encode_fn: F,
) -> Result<EncodedArtifact, EncodeError>
where
    F: FnMut(&EncodingParams) -> Result<Vec<u8>, EncodeError>,
{
    let target = config.target_bytes;
    let step = config.quality_step.max(1);
    let mut attempts = 0u32;

    let mut run = |params: EncodingParams| -> Result<Vec<u8>, EncodeError> {
        attempts += 1;
        let bytes = encode_fn(&params)?;
        debug!(
            width = params.width,
            height = params.height,
            quality = params.quality,
            format = params.format.mime(),
            size = bytes.len(),
            "Encoding attempt"
        );
        Ok(bytes)
    };

    let (mut width, mut height) = fit_within(source.0, source.1, config.max_dim);
    let mut quality = config.initial_quality;
    let mut params = EncodingParams {
        width,
        height,
        quality,
        format: source_format,
    };
    let mut bytes = run(params)?;

    while bytes.len() > target && quality > config.quality_floor {
        quality = quality.saturating_sub(step);
        params = EncodingParams {
            width,
            height,
            quality,
            format: OutputFormat::Jpeg,
        };
        bytes = run(params)?;
    }

    let shrink_quality = quality
        .saturating_sub(step)
        .max(config.shrink_quality_floor);

    while bytes.len() > target && (width > config.min_dim || height > config.min_dim) {
        let next = shrink(width, height, config.shrink_factor);
        if next.0 >= width && next.1 >= height {
            break;
        }
        (width, height) = next;
        params = EncodingParams {
            width,
            height,
            quality: shrink_quality,
            format: OutputFormat::Jpeg,
        };
        bytes = run(params)?;
    }

    let within_target = bytes.len() <= target;
    Ok(EncodedArtifact {
        params,
        bytes,
        attempts,
        within_target,
    })
}
