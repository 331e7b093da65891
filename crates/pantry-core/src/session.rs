//! Client-side session gate for uploads.
//!
//! The login flow stores a JWT under `token` and the user record under
//! `user`. Before uploading, the pipeline reads both and checks the
//! token's `exp` claim and the user's `is_admin` flag.
//!
//! No signature is verified here. This check only spares the user a
//! round-trip that the server would reject anyway; the server remains the
//! authorization boundary and re-validates every request.

use std::collections::HashMap;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

/// Storage key holding the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Storage key holding the JSON user record.
pub const USER_KEY: &str = "user";

/// base64url, tolerant of both padded and unpadded segments.
const JWT_SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Reasons the client refuses to attempt an upload.
///
/// The display strings are shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("Please log in before uploading images.")]
    MissingToken,

    #[error("Session expired, please log in again.")]
    Expired { exp: u64 },

    #[error("Session is invalid, please log in again.")]
    InvalidToken(String),

    #[error("Image uploads require an admin account.")]
    NotAdmin,
}

/// Read-only key-value view of the browser session.
pub trait SessionStore {
    fn get_item(&self, key: &str) -> Option<String>;
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }
}

/// In-memory session store for native callers and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    items: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_item(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }

    pub fn remove_item(&mut self, key: &str) {
        self.items.remove(key);
    }
}

impl SessionStore for MemorySessionStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }
}

/// Wall clock in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// `SystemTime`-backed clock. Not available on `wasm32-unknown-unknown`,
/// where the bindings supply a `Date.now()` clock instead.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}

/// Claims read from the token payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry in seconds since the epoch
    pub exp: Option<f64>,
}

/// The stored user record; only the admin flag matters here.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredUser {
    #[serde(default, deserialize_with = "truthy")]
    pub is_admin: bool,
    #[serde(default)]
    pub email: Option<String>,
}

/// The credential the upload is sent with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub token: String,
    pub is_admin: bool,
}

impl SessionCredential {
    /// Read the session and run the client-side checks in order:
    /// token present, token unexpired, user is admin.
    pub fn authorize<S, C>(store: &S, clock: &C) -> Result<Self, AuthorizationError>
    where
        S: SessionStore + ?Sized,
        C: Clock + ?Sized,
    {
        let token = store
            .get_item(TOKEN_KEY)
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthorizationError::MissingToken)?;

        let claims = decode_claims(&token)?;
        let exp = claims
            .exp
            .filter(|exp| exp.is_finite())
            .ok_or_else(|| AuthorizationError::InvalidToken("missing exp claim".to_string()))?;

        if exp * 1000.0 < clock.now_millis() as f64 {
            return Err(AuthorizationError::Expired { exp: exp as u64 });
        }

        let user = store
            .get_item(USER_KEY)
            .and_then(|raw| serde_json::from_str::<StoredUser>(&raw).ok());

        match user {
            Some(user) if user.is_admin => {
                debug!(email = user.email.as_deref().unwrap_or(""), "Upload session authorized");
                Ok(Self {
                    token,
                    is_admin: true,
                })
            }
            _ => Err(AuthorizationError::NotAdmin),
        }
    }
}

/// Decode the payload (second) segment of a JWT-shaped token.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AuthorizationError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthorizationError::InvalidToken(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    }

    let payload = JWT_SEGMENT
        .decode(parts[1])
        .map_err(|e| AuthorizationError::InvalidToken(e.to_string()))?;

    serde_json::from_slice(&payload).map_err(|e| AuthorizationError::InvalidToken(e.to_string()))
}

/// Accept the loose shapes backends use for flags: booleans, 0/1, strings.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}
