use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;

/// Canonical JSON payload for status and error responses.
#[derive(Debug, Serialize, Clone)]
pub struct ApiMessage {
    pub ok: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }
}

/// Helper for handlers that need to return `(StatusCode, Json<ApiMessage>)`.
pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiMessage>) {
    (status, Json(ApiMessage::error(message)))
}

/// Browser fetch calls mark themselves with the conventional header so the
/// same endpoint can answer JSON instead of a redirect-with-flash.
pub fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false)
}
