use axum::Json;
use axum::body::to_bytes;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Client-facing error: a message and the HTTP status to answer with.
///
/// Every handler and middleware funnels failures through this type so the
/// response body always has the same shape and never leaks internals.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub message: String,
    pub status: StatusCode,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'a str,
    #[serde(rename = "statusCode")]
    status_code: u16,
    message: &'a str,
}

impl AppError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// 404 naming the path the client asked for.
    pub fn not_found(original_uri: &str) -> Self {
        Self::new(
            format!("Can't find {original_uri} on this server!"),
            StatusCode::NOT_FOUND,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.status.is_client_error() {
            "fail"
        } else {
            "error"
        };
        let body = ErrorBody {
            status,
            status_code: self.status.as_u16(),
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Largest framework error body read back when re-rendering it.
const REWRITE_LIMIT: usize = 64 * 1024;

/// Re-renders error responses the framework produced on its own (extractor
/// rejections, the body limit) in the `AppError` shape. Responses that
/// already carry a typed body are left alone.
pub async fn json_errors(response: Response) -> Response {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let plain = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_none_or(|value| value.as_bytes().starts_with(b"text/plain"));
    if !plain {
        return response;
    }

    let body = to_bytes(response.into_body(), REWRITE_LIMIT)
        .await
        .unwrap_or_default();
    let text = String::from_utf8_lossy(&body);
    let message = match text.trim() {
        "" => status.canonical_reason().unwrap_or("Request failed").to_string(),
        text => text.to_string(),
    };
    AppError::new(message, status).into_response()
}
