//! Pantry Core - recipe image pipeline
//!
//! This crate prepares a picked photo for a recipe: it decodes and
//! orients the image, searches for an encoding under the byte budget,
//! checks the stored session and uploads the result, falling back to an
//! inline `data:` URI whenever nothing could be stored.

pub mod config;
pub mod decode;
pub mod editor;
pub mod encode;
pub mod error;
pub mod pipeline;
pub mod search;
pub mod session;
pub mod upload;

pub use config::{ConfigError, PipelineConfig, DEFAULT_API_BASE};
pub use decode::{decode_image, DecodeError, DecodedImage, FilterType, SourceImage};
pub use editor::{RecipeImageEditor, RecipeImageField, SelectionTicket};
pub use encode::{to_data_uri, EncodeError, OutputFormat};
pub use error::PipelineError;
pub use pipeline::{BusyGuard, PipelineOutcome, PipelineView, UploadPipeline};
pub use search::{search_encoding, search_encoding_with, EncodedArtifact, EncodingParams};
pub use session::{
    AuthorizationError, Clock, FixedClock, MemorySessionStore, SessionCredential, SessionStore,
};
pub use upload::{HttpTransport, RawResponse, UploadError, UploadRequest, UploadTransport};

#[cfg(not(target_arch = "wasm32"))]
pub use session::SystemClock;
