//! Adapts JavaScript callbacks to the pipeline's UI boundary.

use js_sys::{Function, Reflect};
use pantry_core::PipelineView;
use tracing::warn;
use wasm_bindgen::prelude::*;

/// Callbacks read from a plain JS object:
///
/// ```typescript
/// { showBusy(message), updateBusy(message), hideBusy(), alert(message) }
/// ```
///
/// Missing callbacks are skipped, except `alert`, which falls back to
/// `window.alert`. `showBusy` fires once per run; message changes go only
/// to `updateBusy`.
#[derive(Debug, Clone, Default)]
pub struct JsView {
    show_busy: Option<Function>,
    update_busy: Option<Function>,
    hide_busy: Option<Function>,
    alert: Option<Function>,
}

impl JsView {
    pub fn from_object(callbacks: &JsValue) -> Self {
        if callbacks.is_undefined() || callbacks.is_null() {
            return Self::default();
        }
        Self {
            show_busy: callback(callbacks, "showBusy"),
            update_busy: callback(callbacks, "updateBusy"),
            hide_busy: callback(callbacks, "hideBusy"),
            alert: callback(callbacks, "alert"),
        }
    }
}

fn callback(object: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(object, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
}

fn invoke(name: &str, function: Option<&Function>, message: Option<&str>) {
    let Some(function) = function else {
        return;
    };
    let result = match message {
        Some(message) => function.call1(&JsValue::NULL, &JsValue::from_str(message)),
        None => function.call0(&JsValue::NULL),
    };
    if let Err(e) = result {
        warn!(callback = name, error = ?e, "View callback threw");
    }
}

impl PipelineView for JsView {
    fn show_busy(&self, message: &str) {
        invoke("showBusy", self.show_busy.as_ref(), Some(message));
    }

    fn update_busy(&self, message: &str) {
        invoke("updateBusy", self.update_busy.as_ref(), Some(message));
    }

    fn hide_busy(&self) {
        invoke("hideBusy", self.hide_busy.as_ref(), None);
    }

    fn alert(&self, message: &str) {
        if self.alert.is_some() {
            invoke("alert", self.alert.as_ref(), Some(message));
        } else if let Some(window) = web_sys::window() {
            if let Err(e) = window.alert_with_message(message) {
                warn!(error = ?e, "window.alert failed");
            }
        }
    }
}
