//! Error envelope for the remote API.
//!
//! Every failed request answers with the same JSON shape:
//! `{"ok": false, "error": "<code>"}`. Internal details are logged on the
//! server side and never forwarded to the client.

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable code placed in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::NotFound => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ApiError::Unauthorized => 401,
            ApiError::NotFound => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Internal(_) => 500,
        }
    }

    /// JSON body sent to the client. Internal detail stays in the log.
    pub fn envelope(&self) -> Value {
        if let ApiError::Internal(detail) = self {
            tracing::error!("api internal error: {detail}");
        }
        json!({ "ok": false, "error": self.code() })
    }
}
