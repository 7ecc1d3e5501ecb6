//! Endpoint handlers

pub mod auth;
pub mod token;

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use ldapgate_core::Error;
use serde::de::DeserializeOwned;
use tracing::error;

pub use auth::exchange_handler;
pub use token::review_handler;

/// Error leaving a handler. Rendered as plain text with the status from
/// [`Error::http_status`].
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Server faults keep their detail in the log only
        let body = if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "Request failed");
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        (status, [(CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
    }
}

/// Decode a JSON request body
pub(crate) fn decode_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|e| Error::DecodeFailed(e.to_string()))
}
