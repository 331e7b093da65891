//! Forwards `tracing` events to the browser console.
//!
//! `pantry-core` logs through `tracing`; in the browser nothing would see
//! those events without a subscriber. [`install_console_logging`] registers a registry
//! with a [`ConsoleLayer`] that maps each level onto the matching
//! `console.*` method.

use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Receives one formatted log line.
pub type ConsoleWriter = fn(&Level, &str);

/// A `tracing` layer that writes every event as one line.
#[derive(Clone, Copy)]
pub struct ConsoleLayer {
    max_level: Level,
    writer: ConsoleWriter,
}

impl ConsoleLayer {
    pub fn new(max_level: Level, writer: ConsoleWriter) -> Self {
        Self { max_level, writer }
    }

    /// Writes to `web_sys::console`.
    #[cfg(target_arch = "wasm32")]
    pub fn browser(max_level: Level) -> Self {
        Self::new(max_level, write_to_console)
    }
}

impl<S> Layer<S> for ConsoleLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let line = visitor.finish(metadata.level(), metadata.target());
        (self.writer)(metadata.level(), &line);
    }
}

/// Collects the message and the structured fields of one event.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self, level: &Level, target: &str) -> String {
        format!("{level} {target}: {}{}", self.message, self.fields)
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn write_to_console(level: &Level, line: &str) {
    use wasm_bindgen::JsValue;
    use web_sys::console;

    let line = JsValue::from_str(line);
    match *level {
        Level::ERROR => console::error_1(&line),
        Level::WARN => console::warn_1(&line),
        Level::INFO => console::info_1(&line),
        _ => console::debug_1(&line),
    }
}

/// Install the console subscriber as the global default.
///
/// Returns `false` when a global subscriber was already set.
pub fn install_console_logging(layer: ConsoleLayer) -> bool {
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
