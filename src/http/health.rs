use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

/// `GET /status`. Answers as soon as the listener is up, whatever state the
/// broker, cache or document store are in.
pub async fn status() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "200 - OK",
        message: "Server is running ...",
    })
}
