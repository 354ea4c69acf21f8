//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same JSON error body and maps chat
//! engine failures onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use debai_chat::ChatError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 413 Payload Too Large - upload over the configured limit.
    PayloadTooLarge(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 502 Bad Gateway - the completion service answered with an error.
    BadGateway(String),
    /// 503 Service Unavailable - a collaborator is not reachable.
    ServiceUnavailable(String),
    /// 504 Gateway Timeout - the completion service did not answer in time.
    GatewayTimeout(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::GatewayTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) | ChatError::InvalidFile(_) => {
                ApiError::BadRequest(message)
            }
            ChatError::FileNotFound(_) => ApiError::NotFound(message),
            ChatError::TransportTimeout(_) => ApiError::GatewayTimeout(message),
            ChatError::Upstream(_) => ApiError::BadGateway(message),
            ChatError::Storage(_) => ApiError::ServiceUnavailable(message),
            ChatError::InvalidTransition { .. } | ChatError::Io(_) => ApiError::Internal(message),
        }
    }
}
