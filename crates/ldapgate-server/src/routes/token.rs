//! Token review: `POST /token`

use axum::{extract::State, Json};
use bytes::Bytes;
use ldapgate_auth::{TokenError, TokenService};
use ldapgate_core::types::{TokenReview, TokenReviewStatus};
use ldapgate_core::{Error, Result};
use tracing::{debug, error};

use super::{decode_json, ApiError};
use crate::metrics::{record_review, ReviewOutcome};
use crate::server::AppState;

/// Resolve the bearer token in `review` to an identity.
///
/// An expired or badly signed token is a successful review with
/// `authenticated = false`. Only a token that cannot be parsed at all is an
/// error. The directory is not consulted.
pub fn review(tokens: &TokenService, mut review: TokenReview) -> Result<TokenReview> {
    let token = tokens.parse(&review.spec.token).map_err(|e| match e {
        TokenError::Malformed(reason) => Error::MalformedToken(reason),
        other => Error::Internal(other.to_string()),
    })?;

    review.status = if tokens.is_valid(&token) {
        let identity = tokens.decode_identity(&token).map_err(|e| {
            error!(error = %e, "Verified token carries no usable identity");
            Error::Internal(e.to_string())
        })?;
        debug!(uid = %identity.uid, "Token authenticated");
        TokenReviewStatus::authenticated(identity)
    } else {
        TokenReviewStatus::unauthenticated()
    };

    Ok(review)
}

pub async fn review_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Json<TokenReview>, ApiError> {
    let result = decode_json::<TokenReview>(&body).and_then(|r| review(&state.tokens, r));

    record_review(match &result {
        Ok(r) if r.status.authenticated => ReviewOutcome::Authenticated,
        Ok(_) => ReviewOutcome::Unauthenticated,
        Err(e) if e.is_client_error() => ReviewOutcome::Malformed,
        Err(_) => ReviewOutcome::Failed,
    });

    Ok(Json(result?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::jdoe;
    use chrono::Duration;
    use ldapgate_auth::testutil::test_token_service;
    use ldapgate_core::types::TokenReviewSpec;

    fn request(token: String) -> TokenReview {
        TokenReview {
            api_version: "authentication.k8s.io/v1".to_string(),
            kind: "TokenReview".to_string(),
            spec: TokenReviewSpec { token },
            status: Default::default(),
        }
    }

    #[test]
    fn test_review_valid_token() {
        let tokens = test_token_service();
        let bearer = tokens.serialize(&tokens.issue(&jdoe(), Duration::minutes(5)).unwrap());

        let reviewed = review(&tokens, request(bearer.clone())).unwrap();
        assert!(reviewed.status.authenticated);
        assert_eq!(reviewed.spec.token, bearer);

        let user = reviewed.status.user.unwrap();
        assert_eq!(user.username, "jdoe");
        assert_eq!(user.uid, "uid=jdoe,ou=people,dc=example,dc=com");
        assert_eq!(user.groups, vec!["platform-admins", "developers"]);
    }

    #[test]
    fn test_review_expired_token() {
        let tokens = test_token_service();
        let bearer = tokens.serialize(&tokens.issue(&jdoe(), Duration::seconds(-5)).unwrap());

        let reviewed = review(&tokens, request(bearer)).unwrap();
        assert!(!reviewed.status.authenticated);
        assert!(reviewed.status.user.is_none());
    }

    #[test]
    fn test_review_malformed_token() {
        let tokens = test_token_service();
        for bearer in ["", "abc", "a.b", "a.b.c"] {
            assert!(matches!(
                review(&tokens, request(bearer.to_string())),
                Err(Error::MalformedToken(_))
            ));
        }
    }
}
