//! The recipe form's image uploader, exposed as a JS class.
//!
//! ```typescript
//! import { ImageUploader } from '@pantry/wasm';
//!
//! const uploader = new ImageUploader(undefined, {
//!   showBusy: (m) => spinner.show(m),
//!   hideBusy: () => spinner.hide(),
//!   alert: (m) => window.alert(m),
//! });
//!
//! input.onchange = async () => {
//!   const file = input.files[0];
//!   const bytes = new Uint8Array(await file.arrayBuffer());
//!   const image = await uploader.selectFile(bytes, file.type, file.name);
//!   if (image !== null) preview.src = image;
//! };
//!
//! form.onsubmit = () => {
//!   recipe.image = uploader.takeForSubmit();
//! };
//! ```

use std::rc::Rc;

use js_sys::Promise;
use pantry_core::{HttpTransport, RecipeImageEditor, SourceImage, UploadPipeline};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::session::{JsClock, LocalStorageSession};
use crate::types::config_from_js;
use crate::view::JsView;

type BrowserEditor = RecipeImageEditor<HttpTransport, LocalStorageSession, JsClock>;

/// Owns one form's image field and the pipeline that fills it.
#[wasm_bindgen]
pub struct ImageUploader {
    editor: Rc<BrowserEditor>,
    view: Rc<JsView>,
}

#[wasm_bindgen]
impl ImageUploader {
    /// `config` is an optional `PipelineConfig` object; `callbacks` holds
    /// `showBusy`, `hideBusy` and `alert`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue, callbacks: JsValue) -> Result<ImageUploader, JsValue> {
        let config = config_from_js(config)?;
        let transport = HttpTransport::new().map_err(|e| JsValue::from_str(&e.to_string()))?;
        let pipeline = UploadPipeline::new(config, transport, LocalStorageSession, JsClock);

        Ok(ImageUploader {
            editor: Rc::new(RecipeImageEditor::new(pipeline)),
            view: Rc::new(JsView::from_object(&callbacks)),
        })
    }

    /// Normalize and upload a picked file.
    ///
    /// Resolves to the image reference now shown in the form (a URL, or a
    /// `data:` URI when nothing was stored), or to `null` when a newer
    /// selection replaced this one. Rejects when the session does not
    /// allow uploads.
    #[wasm_bindgen(js_name = selectFile)]
    pub fn select_file(&self, bytes: Vec<u8>, mime: String, file_name: Option<String>) -> Promise {
        let editor = Rc::clone(&self.editor);
        let view = Rc::clone(&self.view);
        let mut source = SourceImage::new(bytes, mime);
        if let Some(name) = file_name {
            source = source.with_file_name(name);
        }

        future_to_promise(async move {
            match editor.select_file(source, view.as_ref()).await {
                Ok(Some(image)) => Ok(JsValue::from_str(&image)),
                Ok(None) => Ok(JsValue::NULL),
                Err(e) => Err(JsValue::from_str(&e.user_message())),
            }
        })
    }

    /// The image reference currently held by the form.
    #[wasm_bindgen(getter)]
    pub fn current(&self) -> Option<String> {
        self.editor.field().current()
    }

    /// Load the image of a recipe opened for editing.
    #[wasm_bindgen(js_name = setExisting)]
    pub fn set_existing(&self, image: Option<String>) {
        self.editor.field().set_existing(image);
    }

    /// The value to save with the recipe. Oversized inline images are
    /// dropped and the user is told.
    #[wasm_bindgen(js_name = takeForSubmit)]
    pub fn take_for_submit(&self) -> Option<String> {
        self.editor.field().take_for_submit(self.view.as_ref())
    }

    /// Reset after the recipe is saved.
    pub fn clear(&self) {
        self.editor.field().clear();
    }
}
