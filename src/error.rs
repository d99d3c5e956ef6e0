//! Error taxonomy for every call against the directory API.
//!
//! All variants are `Clone` because a single in-flight fetch may be awaited
//! by several coalesced callers, each of which receives its own copy.

use thiserror::Error;

/// Fallback shown when the transport fails or the body cannot be understood.
pub const GENERIC_FAILURE: &str = "Something went wrong while talking to the server. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// HTTP 401 on a session-gated endpoint. Callers switch to a login prompt.
    #[error("unauthorized")]
    Unauthorized,

    /// HTTP 404 on a detail endpoint.
    #[error("{0}")]
    NotFound(String),

    /// Non-2xx response; `message` is the server's `detail`/`message` verbatim
    /// when present, otherwise an operation-specific fallback.
    #[error("{message}")]
    Request { status: u16, message: String },

    /// Connection, timeout or TLS failure before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// Body was not a valid envelope (bad JSON, or `data` absent).
    #[error("{0}")]
    InvalidResponse(String),

    /// The direct-to-storage PUT of an upload returned a non-OK status.
    #[error("file upload failed (HTTP {status}); please retry the upload")]
    Upload { status: u16 },
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Failures worth one transparent retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Request { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Text suitable for an inline message. Transport failures collapse to a
    /// generic sentence; everything else is shown as the server phrased it.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => GENERIC_FAILURE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            log::debug!("[api] malformed response body: {e}");
            ApiError::InvalidResponse(GENERIC_FAILURE.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}
