//! Pipeline configuration.
//!
//! Every field has a default, so callers (including JS objects passed
//! through the WASM bindings) only spell out what they override.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::FilterType;

/// Public backend the recipe client talks to.
pub const DEFAULT_API_BASE: &str = "https://pandor4x-pandorax-backend.onrender.com";

/// A configuration the encoding search cannot run with.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_dim must be at least 1")]
    ZeroMaxDim,

    #[error("shrink_factor must lie strictly between 0 and 1, got {0}")]
    ShrinkFactor(f64),

    #[error("initial_quality must be between 1 and 100, got {0}")]
    Quality(u8),
}

/// Tuning for the encoding search and the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum width/height in pixels
    pub max_dim: u32,
    /// Byte budget the search aims for
    pub target_bytes: usize,
    /// First JPEG quality tried, in percent
    pub initial_quality: u8,
    /// Quality decrement per step, in percent
    pub quality_step: u8,
    /// Quality search runs while quality is above this, in percent
    pub quality_floor: u8,
    /// Lowest quality used during the dimension search, in percent
    pub shrink_quality_floor: u8,
    /// Dimension search runs while either side is above this
    pub min_dim: u32,
    /// Per-step scale factor of the dimension search
    pub shrink_factor: f64,
    /// Resampling filter
    pub filter: FilterType,
    /// Backend origin, without trailing slash
    pub api_base: String,
    /// Upload route appended to `api_base`
    pub upload_path: String,
    /// Public prefix joined with a bare `filename` from the upload response
    pub uploads_prefix: String,
    /// Inline images longer than this are dropped from the recipe payload
    pub max_inline_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dim: 900,
            target_bytes: 500_000,
            initial_quality: 80,
            quality_step: 10,
            quality_floor: 35,
            shrink_quality_floor: 40,
            min_dim: 400,
            shrink_factor: 0.8,
            filter: FilterType::Bilinear,
            api_base: DEFAULT_API_BASE.to_string(),
            upload_path: "/api/upload".to_string(),
            uploads_prefix: "/uploads/".to_string(),
            max_inline_chars: 1_500_000,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject values that would stall or break the encoding search.
    ///
    /// A shrink factor of 1 or more never shrinks; 0 or less collapses the
    /// image to nothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dim == 0 {
            return Err(ConfigError::ZeroMaxDim);
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(ConfigError::ShrinkFactor(self.shrink_factor));
        }
        if !(1..=100).contains(&self.initial_quality) {
            return Err(ConfigError::Quality(self.initial_quality));
        }
        Ok(())
    }

    /// Full URL of the upload endpoint.
    pub fn upload_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            self.upload_path.trim_start_matches('/')
        )
    }

    /// Public path for a stored file name.
    pub fn public_path(&self, filename: &str) -> String {
        format!(
            "{}/{}",
            self.uploads_prefix.trim_end_matches('/'),
            filename.trim_start_matches('/')
        )
    }
}
