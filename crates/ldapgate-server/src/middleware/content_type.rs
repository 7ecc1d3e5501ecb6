//! Content-type guard for the JSON endpoints

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use ldapgate_core::{Error, CONTENT_TYPE_JSON};
use tracing::debug;

use crate::routes::ApiError;

/// Reject any request whose content type is not JSON with 406, before the
/// body is read.
pub async fn require_json(request: Request<Body>, next: Next) -> Result<Response, ApiError> {
    if !is_json(request.headers()) {
        debug!(
            content_type = ?request.headers().get(CONTENT_TYPE),
            path = %request.uri().path(),
            "Rejected non-JSON request"
        );
        return Err(Error::NotAcceptable.into());
    }

    Ok(next.run(request).await)
}

/// `application/json`, case-insensitive, parameters such as `charset`
/// allowed
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|media_type| media_type.trim().eq_ignore_ascii_case(CONTENT_TYPE_JSON))
        .unwrap_or(false)
}
