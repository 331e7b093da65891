//! The recipe form's image slot.
//!
//! A user can pick a second file while the first is still uploading. Both
//! pipelines run to completion, but only the result of the newest
//! selection is kept: every selection takes a [`SelectionTicket`] and a
//! ticket that has been superseded can no longer publish.

use std::cell::{Cell, RefCell};

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::decode::SourceImage;
use crate::error::PipelineError;
use crate::pipeline::{PipelineView, UploadPipeline};
use crate::session::{Clock, SessionStore};
use crate::upload::UploadTransport;

/// Shown when an inline image is too large to send with the recipe.
pub const OVERSIZED_IMAGE_MESSAGE: &str = "The selected image is too large to upload. \
The recipe will be saved without the image. Please resize or pick a smaller image and edit the recipe later.";

/// Proof of which selection a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTicket(u64);

/// Current image reference (URL or `data:` URI) of one recipe form.
///
/// Single-threaded by construction: interior mutability makes it `!Sync`.
#[derive(Debug)]
pub struct RecipeImageField {
    generation: Cell<u64>,
    current: RefCell<Option<String>>,
    max_inline_chars: usize,
}

impl RecipeImageField {
    pub fn new(max_inline_chars: usize) -> Self {
        Self {
            generation: Cell::new(0),
            current: RefCell::new(None),
            max_inline_chars,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_inline_chars)
    }

    /// Start a new selection, invalidating every earlier ticket.
    pub fn begin_selection(&self) -> SelectionTicket {
        let next = self.generation.get().wrapping_add(1);
        self.generation.set(next);
        SelectionTicket(next)
    }

    pub fn is_current(&self, ticket: SelectionTicket) -> bool {
        ticket.0 == self.generation.get()
    }

    /// Store `value` if `ticket` is still the newest selection.
    ///
    /// Returns whether the value was stored.
    pub fn publish(&self, ticket: SelectionTicket, value: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            debug!(ticket = ticket.0, current = self.generation.get(), "Discarding stale image result");
            return false;
        }
        *self.current.borrow_mut() = Some(value.into());
        true
    }

    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// Load the image of a recipe being edited. Invalidates in-flight selections.
    pub fn set_existing(&self, value: Option<String>) {
        self.begin_selection();
        *self.current.borrow_mut() = value.filter(|v| !v.is_empty());
    }

    /// Reset after the form is saved. Invalidates in-flight selections.
    pub fn clear(&self) {
        self.set_existing(None);
    }

    /// The value to send with the recipe, or `None` when it is too large.
    pub fn submit_value(&self) -> Option<String> {
        self.current
            .borrow()
            .as_ref()
            .filter(|v| v.len() <= self.max_inline_chars)
            .cloned()
    }

    /// Like [`submit_value`](Self::submit_value), but tells the user when
    /// an oversized image is being left out.
    pub fn take_for_submit<V: PipelineView + ?Sized>(&self, view: &V) -> Option<String> {
        let value = self.submit_value();
        if value.is_none() {
            if let Some(len) = self.current.borrow().as_ref().map(String::len) {
                warn!(len, limit = self.max_inline_chars, "Dropping oversized image from recipe");
                view.alert(OVERSIZED_IMAGE_MESSAGE);
            }
        }
        value
    }
}

/// Binds a pipeline to the image field it publishes into.
pub struct RecipeImageEditor<T, S, C> {
    pipeline: UploadPipeline<T, S, C>,
    field: RecipeImageField,
}

impl<T, S, C> RecipeImageEditor<T, S, C>
where
    T: UploadTransport,
    S: SessionStore,
    C: Clock,
{
    pub fn new(pipeline: UploadPipeline<T, S, C>) -> Self {
        let field = RecipeImageField::from_config(pipeline.config());
        Self { pipeline, field }
    }

    pub fn field(&self) -> &RecipeImageField {
        &self.field
    }

    pub fn pipeline(&self) -> &UploadPipeline<T, S, C> {
        &self.pipeline
    }

    /// Run the pipeline for a newly picked file and publish its result.
    ///
    /// `Ok(Some(value))` when the result was stored, `Ok(None)` when a newer
    /// selection superseded this one while it ran. An authorization failure
    /// leaves the field untouched.
    pub async fn select_file<V>(&self, source: SourceImage, view: &V) -> Result<Option<String>, PipelineError>
    where
        V: PipelineView + ?Sized,
    {
        let ticket = self.field.begin_selection();
        let outcome = self.pipeline.run(source, view).await?;
        let value = outcome.into_image_ref();

        if self.field.publish(ticket, value.as_str()) {
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::MINIMAL_JPEG;
    use crate::pipeline::tests::{pipeline, RecordingTransport, RecordingView};
    use crate::session::tests::{admin_store, NOW_MS};
    use crate::session::{FixedClock, MemorySessionStore, TOKEN_KEY};
    use crate::upload::{RawResponse, UploadError, UploadRequest};
    use async_trait::async_trait;

    #[test]
    fn test_newest_ticket_wins() {
        let field = RecipeImageField::new(100);
        let first = field.begin_selection();
        let second = field.begin_selection();

        assert!(field.publish(second, "/uploads/second.jpg"));
        assert!(!field.publish(first, "/uploads/first.jpg"));
        assert_eq!(field.current().as_deref(), Some("/uploads/second.jpg"));
    }

    #[test]
    fn test_stale_result_does_not_overwrite_even_if_newest_is_pending() {
        let field = RecipeImageField::new(100);
        let first = field.begin_selection();
        let _second = field.begin_selection();

        assert!(!field.publish(first, "/uploads/first.jpg"));
        assert_eq!(field.current(), None);
    }

    #[test]
    fn test_clear_invalidates_in_flight_selection() {
        let field = RecipeImageField::new(100);
        let ticket = field.begin_selection();
        assert!(field.publish(ticket, "/uploads/a.jpg"));

        let in_flight = field.begin_selection();
        field.clear();

        assert!(!field.publish(in_flight, "/uploads/b.jpg"));
        assert_eq!(field.current(), None);
    }

    #[test]
    fn test_set_existing_ignores_empty() {
        let field = RecipeImageField::new(100);
        field.set_existing(Some("/uploads/old.jpg".to_string()));
        assert_eq!(field.current().as_deref(), Some("/uploads/old.jpg"));

        field.set_existing(Some(String::new()));
        assert_eq!(field.current(), None);
    }

    #[test]
    fn test_oversized_value_is_dropped_with_alert() {
        let field = RecipeImageField::new(16);
        let view = RecordingView::default();
        field.set_existing(Some(format!("data:image/jpeg;base64,{}", "A".repeat(32))));

        assert_eq!(field.take_for_submit(&view), None);
        assert_eq!(*view.alerts.borrow(), vec![OVERSIZED_IMAGE_MESSAGE.to_string()]);
    }

    #[test]
    fn test_value_at_limit_is_kept() {
        let field = RecipeImageField::new(16);
        let view = RecordingView::default();
        field.set_existing(Some("x".repeat(16)));

        assert_eq!(field.take_for_submit(&view).map(|v| v.len()), Some(16));
        assert!(view.alerts.borrow().is_empty());
    }

    #[test]
    fn test_empty_field_submits_nothing_silently() {
        let field = RecipeImageField::new(16);
        let view = RecordingView::default();
        assert_eq!(field.take_for_submit(&view), None);
        assert!(view.alerts.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_select_file_publishes_uploaded_url() {
        let editor = RecipeImageEditor::new(pipeline(
            RecordingTransport::ok(r#"{"url":"https://x/y.jpg"}"#),
            admin_store(),
        ));
        let view = RecordingView::default();

        let published = editor
            .select_file(SourceImage::new(MINIMAL_JPEG.to_vec(), "image/jpeg"), &view)
            .await
            .unwrap();

        assert_eq!(published.as_deref(), Some("https://x/y.jpg"));
        assert_eq!(editor.field().current().as_deref(), Some("https://x/y.jpg"));
    }

    #[tokio::test]
    async fn test_select_file_without_session_keeps_previous_image() {
        let mut store: MemorySessionStore = admin_store();
        store.remove_item(TOKEN_KEY);
        let editor = RecipeImageEditor::new(pipeline(RecordingTransport::ok("{}"), store));
        editor.field().set_existing(Some("/uploads/old.jpg".to_string()));
        let view = RecordingView::default();

        let result = editor
            .select_file(SourceImage::new(MINIMAL_JPEG.to_vec(), "image/jpeg"), &view)
            .await;

        assert!(matches!(result, Err(PipelineError::Authorization(_))));
        assert_eq!(editor.field().current().as_deref(), Some("/uploads/old.jpg"));
    }

    #[tokio::test]
    async fn test_overlapping_selections_keep_the_newest() {
        struct YieldingTransport;

        #[async_trait]
        impl UploadTransport for YieldingTransport {
            async fn send(&self, _request: UploadRequest) -> Result<RawResponse, UploadError> {
                tokio::task::yield_now().await;
                Ok(RawResponse::new(200, r#"{"filename":"same.jpg"}"#))
            }
        }

        let editor = RecipeImageEditor::new(UploadPipeline::new(
            PipelineConfig::new(),
            YieldingTransport,
            admin_store(),
            FixedClock(NOW_MS),
        ));
        let view = RecordingView::default();
        let source = SourceImage::new(MINIMAL_JPEG.to_vec(), "image/jpeg");

        // Each run suspends at the upload, so the second selection starts
        // while the first is still in flight.
        let (first, second) = tokio::join!(
            editor.select_file(source.clone(), &view),
            editor.select_file(source, &view)
        );

        assert_eq!(first.unwrap(), None);
        assert_eq!(second.unwrap().as_deref(), Some("/uploads/same.jpg"));
        assert_eq!(editor.field().current().as_deref(), Some("/uploads/same.jpg"));
        assert_eq!(view.shown.get(), 2);
        assert_eq!(view.hidden.get(), 2);
    }
}
