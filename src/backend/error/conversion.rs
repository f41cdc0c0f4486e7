//! Error Conversion
//!
//! `IntoResponse` for [`BackendError`], so handlers can return it directly.
//! Error responses use the same envelope the REST API uses elsewhere:
//! `{"success": false, "error": "..."}` with the mapped status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::backend::error::types::BackendError;

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("[Error] {}", self);
        }
        let body = serde_json::json!({
            "success": false,
            "error": self.message(),
        });
        (status, Json(body)).into_response()
    }
}
