//! Top-level error type of the upload pipeline.

use thiserror::Error;

use crate::decode::DecodeError;
use crate::encode::EncodeError;
use crate::session::AuthorizationError;
use crate::upload::UploadError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The file could not be read as an image; the original bytes are kept.
    #[error("Image could not be decoded: {0}")]
    Decode(#[from] DecodeError),

    /// The session failed the client-side checks; nothing was sent.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// The upload did not produce a stored image.
    #[error("Image upload failed: {0}")]
    Upload(#[from] UploadError),

    /// Resizing or encoding failed after a successful decode.
    #[error("Image processing failed: {0}")]
    Encode(#[from] EncodeError),
}

impl PipelineError {
    /// Text shown to the user in an alert.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Whether the user should be told. Decode fallbacks are only logged.
    pub fn should_alert(&self) -> bool {
        !matches!(self, PipelineError::Decode(_))
    }
}
