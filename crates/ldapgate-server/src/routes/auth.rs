//! Credential exchange: `POST /auth`

use axum::{extract::State, Json};
use bytes::Bytes;
use chrono::Duration;
use ldapgate_auth::{Directory, TokenService};
use ldapgate_core::types::{Credentials, ExecCredential};
use ldapgate_core::{Error, Result};
use tracing::{debug, error, info, warn};

use super::{decode_json, ApiError};
use crate::metrics::{record_directory_error, record_exchange, ExchangeOutcome};
use crate::server::AppState;

/// Verify `credentials` against the directory and issue a token.
///
/// Every directory failure becomes [`Error::Unauthorized`]; the specific
/// cause is logged and counted only. Token issuance failures are
/// [`Error::Internal`].
pub async fn exchange(
    directory: &dyn Directory,
    tokens: &TokenService,
    ttl: Duration,
    credentials: &Credentials,
) -> Result<ExecCredential> {
    if !credentials.is_valid() {
        return Err(Error::MalformedCredentials);
    }

    let identity = directory
        .authenticate(&credentials.username, &credentials.password)
        .await
        .map_err(|e| {
            record_directory_error(e.kind());
            if e.is_directory_fault() {
                warn!(username = %credentials.username, kind = e.kind(), error = %e, "Directory authentication failed");
            } else {
                debug!(username = %credentials.username, kind = e.kind(), "Directory authentication rejected");
            }
            Error::Unauthorized
        })?;

    let token = tokens.issue(&identity, ttl).map_err(|e| {
        error!(uid = %identity.uid, error = %e, "Token issuance failed");
        Error::Internal(format!("token issuance: {}", e))
    })?;

    info!(uid = %identity.uid, groups = identity.groups.len(), "Issued token");

    Ok(ExecCredential::new(tokens.serialize(&token), token.expiration()))
}

pub async fn exchange_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Json<ExecCredential>, ApiError> {
    let result = match decode_json::<Credentials>(&body) {
        Ok(credentials) => {
            exchange(
                state.directory.as_ref(),
                &state.tokens,
                state.token_ttl,
                &credentials,
            )
            .await
        }
        Err(e) => Err(e),
    };

    record_exchange(match &result {
        Ok(_) => ExchangeOutcome::Issued,
        Err(Error::Unauthorized) => ExchangeOutcome::Unauthorized,
        Err(e) if e.is_client_error() => ExchangeOutcome::Malformed,
        Err(_) => ExchangeOutcome::Failed,
    });

    Ok(Json(result?))
}
