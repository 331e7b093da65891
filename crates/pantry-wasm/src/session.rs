//! Browser implementations of the session and clock boundaries.

use pantry_core::{Clock, SessionStore};

/// Reads the session the login page stored in `window.localStorage`.
///
/// Storage that is missing or blocked (private mode, sandboxed frames)
/// reads as an empty session.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorageSession;

impl SessionStore for LocalStorageSession {
    fn get_item(&self, key: &str) -> Option<String> {
        let storage = web_sys::window()?.local_storage().ok()??;
        storage.get_item(key).ok()?
    }
}

/// `Date.now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsClock;

impl Clock for JsClock {
    fn now_millis(&self) -> u64 {
        let now = js_sys::Date::now();
        if now.is_finite() && now > 0.0 {
            now as u64
        } else {
            0
        }
    }
}
