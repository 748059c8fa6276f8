//! JSON error responses
//!
//! Every error body carries the request id. Internal failures never expose
//! their cause to the client; it is logged server-side under the same id.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    request_id: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>, request_id: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            request_id: request_id.to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>, request_id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            request_id: request_id.to_string(),
        }
    }

    pub fn internal(request_id: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
            request_id: request_id.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(super::REQUEST_ID_HEADER, self.request_id.clone())],
            Json(json!({
                "error": self.message,
                "requestId": self.request_id,
            })),
        )
            .into_response()
    }
}
