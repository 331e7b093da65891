//! The image normalization and upload pipeline.
//!
//! One run takes a picked file through decode, the encoding search, the
//! session gate and the upload, and ends with either a stored image URL or
//! a local `data:` URI the form can still use. The busy indicator is held
//! by a [`BusyGuard`] for the whole run and cleared on every exit path.

use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::decode::{decode_image, SourceImage};
use crate::encode::{to_data_uri, OutputFormat};
use crate::error::PipelineError;
use crate::search::{search_encoding, EncodedArtifact};
use crate::session::{Clock, SessionCredential, SessionStore};
use crate::upload::{interpret_response, UploadRequest, UploadTransport, DEFAULT_FILE_NAME};

pub const RESIZING_MESSAGE: &str = "Resizing image...";
pub const UPLOADING_MESSAGE: &str = "Uploading image...";

/// The UI surface the pipeline reports to.
pub trait PipelineView {
    /// Raise the busy indicator.
    fn show_busy(&self, message: &str);

    /// Change the busy message while it is raised. Never raises it again;
    /// views without a message slot keep showing the first message.
    fn update_busy(&self, _message: &str) {}

    /// Clear the busy indicator.
    fn hide_busy(&self);

    /// Tell the user something went wrong.
    fn alert(&self, message: &str);
}

impl<T: PipelineView + ?Sized> PipelineView for &T {
    fn show_busy(&self, message: &str) {
        (**self).show_busy(message);
    }

    fn update_busy(&self, message: &str) {
        (**self).update_busy(message);
    }

    fn hide_busy(&self) {
        (**self).hide_busy();
    }

    fn alert(&self, message: &str) {
        (**self).alert(message);
    }
}

/// Holds the busy indicator up until dropped.
///
/// Dropping happens on return, on `?`, on unwinding and when the owning
/// future is dropped mid-await.
pub struct BusyGuard<'a, V: PipelineView + ?Sized> {
    view: &'a V,
}

impl<'a, V: PipelineView + ?Sized> BusyGuard<'a, V> {
    pub fn new(view: &'a V, message: &str) -> Self {
        view.show_busy(message);
        Self { view }
    }

    pub fn update(&self, message: &str) {
        self.view.update_busy(message);
    }
}

impl<V: PipelineView + ?Sized> Drop for BusyGuard<'_, V> {
    fn drop(&mut self) {
        self.view.hide_busy();
    }
}

/// Terminal value of a run that produced something displayable.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The server stored the image at `url`.
    Uploaded { url: String },
    /// Nothing was stored; `data_uri` holds the best local bytes available.
    Degraded { data_uri: String, cause: PipelineError },
}

impl PipelineOutcome {
    /// The value to put in the preview and the recipe payload.
    pub fn image_ref(&self) -> &str {
        match self {
            PipelineOutcome::Uploaded { url } => url,
            PipelineOutcome::Degraded { data_uri, .. } => data_uri,
        }
    }

    pub fn into_image_ref(self) -> String {
        match self {
            PipelineOutcome::Uploaded { url } => url,
            PipelineOutcome::Degraded { data_uri, .. } => data_uri,
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, PipelineOutcome::Uploaded { .. })
    }
}

/// Pipeline wiring: configuration plus the three external collaborators.
pub struct UploadPipeline<T, S, C> {
    config: PipelineConfig,
    transport: T,
    session: S,
    clock: C,
}

impl<T, S, C> UploadPipeline<T, S, C>
where
    T: UploadTransport,
    S: SessionStore,
    C: Clock,
{
    pub fn new(config: PipelineConfig, transport: T, session: S, clock: C) -> Self {
        Self {
            config,
            transport,
            session,
            clock,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decode and run the encoding search, without touching the network.
    pub fn normalize(&self, source: &SourceImage) -> Result<EncodedArtifact, PipelineError> {
        let decoded = decode_image(&source.bytes)?;
        let format = OutputFormat::for_source_mime(&source.mime);
        Ok(search_encoding(&decoded, format, &self.config)?)
    }

    /// Run the whole pipeline for one picked file.
    ///
    /// Returns `Err` only when the session gate refuses the upload; every
    /// other failure degrades to a local `data:` URI.
    pub async fn run<V>(&self, source: SourceImage, view: &V) -> Result<PipelineOutcome, PipelineError>
    where
        V: PipelineView + ?Sized,
    {
        let busy = BusyGuard::new(view, RESIZING_MESSAGE);

        let artifact = match self.normalize(&source) {
            Ok(artifact) => artifact,
            Err(cause) => {
                if cause.should_alert() {
                    error!(error = %cause, mime = %source.mime, "Image processing failed");
                    view.alert(&cause.user_message());
                } else {
                    warn!(error = %cause, mime = %source.mime, "Decode failed, keeping original bytes");
                }
                return Ok(PipelineOutcome::Degraded {
                    data_uri: to_data_uri(&source.mime, &source.bytes),
                    cause,
                });
            }
        };

        if !artifact.within_target {
            warn!(
                size = artifact.len(),
                target = self.config.target_bytes,
                width = artifact.params.width,
                height = artifact.params.height,
                "Encoding is still over the byte budget after both searches"
            );
        }

        let credential = match SessionCredential::authorize(&self.session, &self.clock) {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Upload refused before sending");
                view.alert(&e.to_string());
                return Err(e.into());
            }
        };

        busy.update(UPLOADING_MESSAGE);

        let request = UploadRequest {
            url: self.config.upload_url(),
            token: credential.token,
            file_name: source
                .file_name
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            mime: artifact.mime().to_string(),
            bytes: artifact.bytes.clone(),
        };

        let located = match self.transport.send(request).await {
            Ok(response) => interpret_response(&response, &self.config),
            Err(e) => Err(e),
        };

        match located {
            Ok(url) => {
                info!(
                    url = %url,
                    size = artifact.len(),
                    attempts = artifact.attempts,
                    "Image uploaded"
                );
                Ok(PipelineOutcome::Uploaded { url })
            }
            Err(e) => {
                let cause = PipelineError::from(e);
                error!(error = %cause, "Upload failed, falling back to inline image");
                view.alert(&cause.user_message());
                Ok(PipelineOutcome::Degraded {
                    data_uri: artifact.to_data_uri(),
                    cause,
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::decode::{png_bytes, MINIMAL_JPEG};
    use crate::session::tests::{admin_store, make_token, NOW_MS};
    use crate::session::{AuthorizationError, FixedClock, MemorySessionStore, TOKEN_KEY, USER_KEY};
    use crate::upload::{RawResponse, UploadError};
    use async_trait::async_trait;
    use std::cell::{Cell, RefCell};
    use std::sync::Mutex;

    /// Records every request and answers with a canned result.
    pub(crate) struct RecordingTransport {
        pub(crate) requests: Mutex<Vec<UploadRequest>>,
        reply: Result<RawResponse, UploadError>,
    }

    impl RecordingTransport {
        pub(crate) fn replying(reply: Result<RawResponse, UploadError>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                reply,
            }
        }

        pub(crate) fn ok(body: &str) -> Self {
            Self::replying(Ok(RawResponse::new(200, body)))
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl UploadTransport for RecordingTransport {
        async fn send(&self, request: UploadRequest) -> Result<RawResponse, UploadError> {
            self.requests.lock().unwrap().push(request);
            self.reply.clone()
        }
    }

    /// Counts busy transitions and collects alerts.
    #[derive(Default)]
    pub(crate) struct RecordingView {
        pub(crate) shown: Cell<u32>,
        pub(crate) hidden: Cell<u32>,
        pub(crate) messages: RefCell<Vec<String>>,
        pub(crate) alerts: RefCell<Vec<String>>,
    }

    impl RecordingView {
        /// True when the indicator went up once and came down once.
        pub(crate) fn balanced_once(&self) -> bool {
            self.shown.get() == 1 && self.hidden.get() == 1
        }
    }

    impl PipelineView for RecordingView {
        fn show_busy(&self, message: &str) {
            self.shown.set(self.shown.get() + 1);
            self.messages.borrow_mut().push(message.to_string());
        }

        fn update_busy(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_string());
        }

        fn hide_busy(&self) {
            self.hidden.set(self.hidden.get() + 1);
        }

        fn alert(&self, message: &str) {
            self.alerts.borrow_mut().push(message.to_string());
        }
    }

    pub(crate) type TestPipeline = UploadPipeline<RecordingTransport, MemorySessionStore, FixedClock>;

    pub(crate) fn pipeline(transport: RecordingTransport, store: MemorySessionStore) -> TestPipeline {
        UploadPipeline::new(PipelineConfig::new(), transport, store, FixedClock(NOW_MS))
    }

    fn jpeg_source() -> SourceImage {
        SourceImage::new(MINIMAL_JPEG.to_vec(), "image/jpeg").with_file_name("pie.jpg")
    }

    #[tokio::test]
    async fn test_successful_upload_returns_url_exactly() {
        let p = pipeline(RecordingTransport::ok(r#"{"url":"https://x/y.jpg"}"#), admin_store());
        let view = RecordingView::default();

        let outcome = p.run(jpeg_source(), &view).await.unwrap();

        assert!(matches!(&outcome, PipelineOutcome::Uploaded { url } if url == "https://x/y.jpg"));
        assert!(outcome.is_persistent());
        assert!(view.balanced_once());
        assert!(view.alerts.borrow().is_empty());
        assert_eq!(
            *view.messages.borrow(),
            vec![RESIZING_MESSAGE.to_string(), UPLOADING_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_busy_is_raised_once_for_view_without_update() {
        #[derive(Default)]
        struct CountingView {
            shown: Cell<u32>,
            hidden: Cell<u32>,
        }

        impl PipelineView for CountingView {
            fn show_busy(&self, _message: &str) {
                self.shown.set(self.shown.get() + 1);
            }

            fn hide_busy(&self) {
                self.hidden.set(self.hidden.get() + 1);
            }

            fn alert(&self, _message: &str) {}
        }

        let p = pipeline(RecordingTransport::ok(r#"{"url":"/u.jpg"}"#), admin_store());
        let view = CountingView::default();

        let outcome = p.run(jpeg_source(), &view).await.unwrap();

        assert!(outcome.is_persistent());
        assert_eq!(view.shown.get(), 1);
        assert_eq!(view.hidden.get(), 1);
    }

    #[tokio::test]
    async fn test_request_carries_token_name_and_mime() {
        let p = pipeline(RecordingTransport::ok(r#"{"filename":"abc.jpg"}"#), admin_store());
        let view = RecordingView::default();

        let outcome = p.run(jpeg_source(), &view).await.unwrap();
        assert_eq!(outcome.image_ref(), "/uploads/abc.jpg");

        let requests = p.transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let sent = &requests[0];
        assert_eq!(sent.url, format!("{}/api/upload", crate::config::DEFAULT_API_BASE));
        assert_eq!(sent.token, admin_store().get_item(TOKEN_KEY).unwrap());
        assert_eq!(sent.file_name, "pie.jpg");
        assert_eq!(sent.mime, "image/jpeg");
        assert_eq!(&sent.bytes[0..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_missing_file_name_defaults() {
        let p = pipeline(RecordingTransport::ok(r#"{"url":"/u.jpg"}"#), admin_store());
        let view = RecordingView::default();

        p.run(SourceImage::new(MINIMAL_JPEG.to_vec(), "image/jpeg"), &view)
            .await
            .unwrap();

        assert_eq!(p.transport.requests.lock().unwrap()[0].file_name, DEFAULT_FILE_NAME);
    }

    #[tokio::test]
    async fn test_small_png_is_uploaded_as_png() {
        let p = pipeline(RecordingTransport::ok(r#"{"url":"/u.png"}"#), admin_store());
        let view = RecordingView::default();

        p.run(SourceImage::new(png_bytes(40, 30), "image/png"), &view)
            .await
            .unwrap();

        assert_eq!(p.transport.requests.lock().unwrap()[0].mime, "image/png");
    }

    #[tokio::test]
    async fn test_no_token_means_no_request() {
        let mut store = admin_store();
        store.remove_item(TOKEN_KEY);
        let p = pipeline(RecordingTransport::ok(r#"{"url":"/u.jpg"}"#), store);
        let view = RecordingView::default();

        let result = p.run(jpeg_source(), &view).await;

        assert!(matches!(
            result,
            Err(PipelineError::Authorization(AuthorizationError::MissingToken))
        ));
        assert_eq!(p.transport.request_count(), 0);
        assert_eq!(*view.alerts.borrow(), vec!["Please log in before uploading images."]);
        assert!(view.balanced_once());
    }

    #[tokio::test]
    async fn test_expired_token_means_no_request() {
        let mut store = admin_store();
        store.set_item(TOKEN_KEY, make_token(&format!(r#"{{"exp":{}}}"#, NOW_MS / 1000 - 60)));
        let p = pipeline(RecordingTransport::ok(r#"{"url":"/u.jpg"}"#), store);
        let view = RecordingView::default();

        let result = p.run(jpeg_source(), &view).await;

        assert!(matches!(
            result,
            Err(PipelineError::Authorization(AuthorizationError::Expired { .. }))
        ));
        assert_eq!(p.transport.request_count(), 0);
        assert!(view.balanced_once());
    }

    #[tokio::test]
    async fn test_non_admin_means_no_request() {
        let mut store = admin_store();
        store.set_item(USER_KEY, r#"{"email":"cook@example.com","is_admin":false}"#);
        let p = pipeline(RecordingTransport::ok(r#"{"url":"/u.jpg"}"#), store);
        let view = RecordingView::default();

        let result = p.run(jpeg_source(), &view).await;

        assert!(matches!(
            result,
            Err(PipelineError::Authorization(AuthorizationError::NotAdmin))
        ));
        assert_eq!(p.transport.request_count(), 0);
        assert_eq!(*view.messages.borrow(), vec![RESIZING_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_server_error_degrades_to_inline_jpeg() {
        let transport = RecordingTransport::replying(Ok(RawResponse::new(
            500,
            r#"{"error":"Disk full"}"#,
        )));
        let p = pipeline(transport, admin_store());
        let view = RecordingView::default();

        let outcome = p.run(jpeg_source(), &view).await.unwrap();

        match &outcome {
            PipelineOutcome::Degraded { data_uri, cause } => {
                assert!(data_uri.starts_with("data:image/jpeg;base64,"));
                assert!(matches!(cause, PipelineError::Upload(UploadError::Rejected { status: 500, .. })));
            }
            other => panic!("expected degraded outcome, got {other:?}"),
        }
        assert_eq!(*view.alerts.borrow(), vec!["Image upload failed: Disk full"]);
        assert!(view.balanced_once());
    }

    #[tokio::test]
    async fn test_network_error_degrades_without_retry() {
        let transport =
            RecordingTransport::replying(Err(UploadError::Network("connection reset".to_string())));
        let p = pipeline(transport, admin_store());
        let view = RecordingView::default();

        let outcome = p.run(jpeg_source(), &view).await.unwrap();

        assert!(!outcome.is_persistent());
        assert_eq!(p.transport.request_count(), 1);
        assert_eq!(view.alerts.borrow().len(), 1);
        assert!(view.balanced_once());
    }

    #[tokio::test]
    async fn test_undecodable_file_keeps_original_bytes_silently() {
        let p = pipeline(RecordingTransport::ok(r#"{"url":"/u.jpg"}"#), admin_store());
        let view = RecordingView::default();
        let source = SourceImage::new(b"GIF-ish garbage".to_vec(), "image/gif");

        let outcome = p.run(source.clone(), &view).await.unwrap();

        match outcome {
            PipelineOutcome::Degraded { data_uri, cause } => {
                assert_eq!(data_uri, to_data_uri("image/gif", &source.bytes));
                assert!(matches!(cause, PipelineError::Decode(_)));
            }
            other => panic!("expected degraded outcome, got {other:?}"),
        }
        assert_eq!(p.transport.request_count(), 0);
        assert!(view.alerts.borrow().is_empty());
        assert!(view.balanced_once());
    }

    #[test]
    fn test_busy_cleared_when_transport_panics() {
        struct PanickingTransport;

        #[async_trait]
        impl UploadTransport for PanickingTransport {
            async fn send(&self, _request: UploadRequest) -> Result<RawResponse, UploadError> {
                panic!("transport exploded");
            }
        }

        let p = UploadPipeline::new(
            PipelineConfig::new(),
            PanickingTransport,
            admin_store(),
            FixedClock(NOW_MS),
        );
        let view = RecordingView::default();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(p.run(jpeg_source(), &view))
        }));

        assert!(result.is_err());
        assert!(view.balanced_once());
    }

    #[tokio::test]
    async fn test_busy_cleared_when_run_is_abandoned() {
        struct StalledTransport;

        #[async_trait]
        impl UploadTransport for StalledTransport {
            async fn send(&self, _request: UploadRequest) -> Result<RawResponse, UploadError> {
                std::future::pending().await
            }
        }

        let p = UploadPipeline::new(
            PipelineConfig::new(),
            StalledTransport,
            admin_store(),
            FixedClock(NOW_MS),
        );
        let view = RecordingView::default();

        {
            let run = p.run(jpeg_source(), &view);
            tokio::pin!(run);
            tokio::select! {
                biased;
                _ = &mut run => panic!("stalled upload should not finish"),
                _ = tokio::task::yield_now() => {}
            }
            assert_eq!(view.shown.get(), 1);
            assert_eq!(view.hidden.get(), 0);
        }

        assert!(view.balanced_once());
    }

    #[test]
    fn test_normalize_bounds_large_png_and_switches_to_jpeg() {
        let mut config = PipelineConfig::new();
        config.target_bytes = 1;
        let p = UploadPipeline::new(
            config,
            RecordingTransport::ok("{}"),
            admin_store(),
            FixedClock(NOW_MS),
        );

        let artifact = p
            .normalize(&SourceImage::new(png_bytes(1200, 600), "image/png"))
            .unwrap();

        assert!(artifact.params.width <= 900 && artifact.params.height <= 900);
        assert_eq!(artifact.params.format, OutputFormat::Jpeg);
        assert_eq!(artifact.mime(), "image/jpeg");
    }
}
