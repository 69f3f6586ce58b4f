//! API response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Success envelope. Failures are rendered by `AppError` as `{"error": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response.
    pub const fn ok(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Acknowledgement for operations with nothing else to return.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}

impl ApiResponse<Ack> {
    /// `{"data": {"ok": true}}`.
    pub const fn ack() -> Self {
        Self::ok(Ack { ok: true })
    }
}

/// Count payload for tallies.
#[derive(Debug, Serialize)]
pub struct Count {
    pub count: u64,
}
