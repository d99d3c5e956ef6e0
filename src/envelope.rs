//! `{ success, message?, data, meta? }` envelope used by every API response.
//!
//! The raw JSON is decoded once at the HTTP boundary into [`Envelope`], which
//! is either `Ok { data, meta }` or `Err { message }`. Nothing above this
//! layer ever checks whether `data` happens to be present.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T, M> {
    Ok { data: T, meta: Option<M> },
    Err { message: String },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    meta: Option<Value>,
}

fn default_success() -> bool {
    true
}

impl<T: DeserializeOwned, M: DeserializeOwned> Envelope<T, M> {
    /// Decode a response body. `fallback` is used as the message when the
    /// server gives none.
    pub fn decode(body: &[u8], fallback: &str) -> Result<Self, ApiError> {
        let raw: RawEnvelope = serde_json::from_slice(body).map_err(|e| unreadable(fallback, e))?;

        let message = raw
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());

        if !raw.success {
            return Ok(Envelope::Err { message });
        }
        let data = match raw.data {
            Some(Value::Null) | None => return Ok(Envelope::Err { message }),
            Some(v) => v,
        };

        let data: T = serde_json::from_value(data).map_err(|e| unreadable(fallback, e))?;
        let meta = match raw.meta {
            Some(Value::Null) | None => None,
            Some(v) => Some(serde_json::from_value::<M>(v).map_err(|e| unreadable(fallback, e))?),
        };
        Ok(Envelope::Ok { data, meta })
    }

    pub fn into_result(self) -> Result<(T, Option<M>), ApiError> {
        match self {
            Envelope::Ok { data, meta } => Ok((data, meta)),
            Envelope::Err { message } => Err(ApiError::InvalidResponse(message)),
        }
    }
}

// Serde's text stays in the log; callers only ever show `fallback`.
fn unreadable(fallback: &str, e: serde_json::Error) -> ApiError {
    log::debug!("[api] undecodable response ({fallback}): {e}");
    ApiError::InvalidResponse(fallback.to_string())
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"detail": "..."}`, FastAPI-style `{"detail": [{"msg": ...}]}`
/// and the envelope's own `{"message": "..."}`.
pub fn error_message(body: &[u8]) -> Option<String> {
    let v: Value = serde_json::from_slice(body).ok()?;
    match v.get("detail") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
                .collect();
            if !msgs.is_empty() {
                return Some(msgs.join("; "));
            }
        }
        _ => {}
    }
    v.get("message")
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
