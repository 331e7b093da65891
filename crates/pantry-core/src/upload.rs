//! Upload client for `POST /api/upload`.
//!
//! The transport is a trait so the pipeline can be driven without a
//! network in tests. [`HttpTransport`] is the real implementation; it
//! uses `reqwest`, which maps onto `fetch` when compiled to wasm32.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use thiserror::Error;

use crate::config::PipelineConfig;

/// Multipart field the server reads the file from.
pub const UPLOAD_FIELD: &str = "image";
/// File name used when the picker did not report one.
pub const DEFAULT_FILE_NAME: &str = "upload.jpg";

/// Errors from the upload step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    /// A success status with a body we cannot use.
    #[error("Unexpected upload response: {0}")]
    UnexpectedResponse(String),
}

/// Everything needed to send one file.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub url: String,
    pub token: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Status and body text, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends an upload request and returns the raw response.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait UploadTransport {
    async fn send(&self, request: UploadRequest) -> Result<RawResponse, UploadError>;
}

/// `reqwest`-backed transport. No request timeout is set.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| UploadError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl UploadTransport for HttpTransport {
    async fn send(&self, request: UploadRequest) -> Result<RawResponse, UploadError> {
        let part = Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(&request.mime)
            .map_err(|e| UploadError::Network(e.to_string()))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&request.url)
            .bearer_auth(&request.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        Ok(RawResponse { status, body })
    }
}

/// Turn a raw response into the public location of the stored image.
///
/// Success bodies carry either `url` (used verbatim) or `filename` (joined
/// with the uploads prefix). Failure bodies carry `error` or `message`;
/// when neither is present, or the body is not JSON, the status code is
/// reported instead.
pub fn interpret_response(
    response: &RawResponse,
    config: &PipelineConfig,
) -> Result<String, UploadError> {
    let json: Option<Value> = serde_json::from_str(&response.body).ok();
    let field = |name: &str| {
        json.as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if !response.is_success() {
        let detail = field("error")
            .or_else(|| field("message"))
            .unwrap_or_else(|| response.status.to_string());
        return Err(UploadError::Rejected {
            status: response.status,
            detail,
        });
    }

    if json.is_none() {
        return Err(UploadError::UnexpectedResponse(
            "response body is not JSON".to_string(),
        ));
    }

    if let Some(url) = field("url") {
        return Ok(url);
    }
    if let Some(filename) = field("filename") {
        return Ok(config.public_path(&filename));
    }

    Err(UploadError::UnexpectedResponse(
        "response has neither url nor filename".to_string(),
    ))
}
