// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Convert livecast_core errors to HTTP errors
impl From<livecast_core::Error> for AppError {
    fn from(err: livecast_core::Error) -> Self {
        use livecast_core::Error;

        match err {
            Error::InvalidOffer(msg) => Self::bad_request(msg),
            Error::UnknownStreamKey(key) => {
                Self::forbidden(format!("stream key not accepted: {key}"))
            }
            Error::Negotiation(msg) => {
                tracing::error!("negotiation error: {}", msg);
                Self::internal_server_error("negotiation failed")
            }
            Error::TransportInit(msg) => {
                tracing::error!("transport error: {}", msg);
                Self::internal_server_error("transport unavailable")
            }
            Error::ChannelClosed(msg) => {
                tracing::error!("channel error: {}", msg);
                Self::internal_server_error("channel closed")
            }
            Error::Serialization(e) => Self::bad_request(format!("JSON error: {e}")),
            Error::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                Self::internal_server_error("internal server error")
            }
        }
    }
}

/// Convert serde_json errors to HTTP errors
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("JSON error: {err}"))
    }
}
