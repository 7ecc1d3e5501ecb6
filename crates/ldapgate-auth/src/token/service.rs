//! Token service
//!
//! Wire format is a compact JWS: `base64url(header).base64url(claims).signature`.
//! The decoded [`Token`] keeps the exact segments it was built from, so
//! serializing a parsed token reproduces the bearer string byte for byte.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::Algorithm;
use ldapgate_core::types::Identity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::keys::{SigningKeyPair, TokenSigner, TokenVerifier};
use super::TokenError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: Algorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Claims carried by every token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer
    pub iss: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Embedded identity, decoded on demand by
    /// [`TokenService::decode_identity`]
    pub user: serde_json::Value,
}

/// Decoded form of a bearer token
#[derive(Debug, Clone)]
pub struct Token {
    header: TokenHeader,
    claims: TokenClaims,
    /// `header.claims` exactly as signed
    signing_input: String,
    signature: String,
}

impl Token {
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    /// Embedded expiration. Not validated here; see
    /// [`TokenService::is_valid`].
    pub fn expiration(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.claims.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.claims.exp
    }
}

/// Issues, serializes, parses and checks bearer tokens
pub struct TokenService {
    issuer: String,
    signer: Arc<dyn TokenSigner>,
    verifier: Arc<dyn TokenVerifier>,
}

impl TokenService {
    pub fn new(
        issuer: impl Into<String>,
        signer: Arc<dyn TokenSigner>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            signer,
            verifier,
        }
    }

    /// Sign and verify with the same key pair
    pub fn with_key_pair(issuer: impl Into<String>, keys: Arc<SigningKeyPair>) -> Self {
        Self::new(issuer, keys.clone(), keys)
    }

    /// Issue a token for `identity` expiring `ttl` from now
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<Token, TokenError> {
        let now = Utc::now();

        let header = TokenHeader {
            alg: self.signer.algorithm(),
            typ: Some("JWT".to_string()),
        };
        let expiration = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Claims(format!("token lifetime {} is out of range", ttl)))?;

        let claims = TokenClaims {
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            user: serde_json::to_value(identity)
                .map_err(|e| TokenError::Claims(format!("Failed to encode identity: {}", e)))?,
        };

        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);
        let signature = self.signer.sign(signing_input.as_bytes())?;

        debug!(uid = %identity.uid, exp = claims.exp, "Issued token");

        Ok(Token {
            header,
            claims,
            signing_input,
            signature,
        })
    }

    /// Bearer string for a token
    pub fn serialize(&self, token: &Token) -> String {
        format!("{}.{}", token.signing_input, token.signature)
    }

    /// Decode a bearer string. Fails only on structural problems; a token
    /// that parses may still be expired or carry a bad signature.
    pub fn parse(&self, bearer: &str) -> Result<Token, TokenError> {
        let mut segments = bearer.trim().split('.');
        let (header_b64, claims_b64, signature) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(h), Some(c), Some(s), None) if !h.is_empty() && !c.is_empty() && !s.is_empty() => {
                    (h, c, s)
                }
                _ => {
                    return Err(TokenError::Malformed(
                        "token must have three non-empty segments".to_string(),
                    ))
                }
            };

        let header: TokenHeader = decode_segment(header_b64, "header")?;
        let claims: TokenClaims = decode_segment(claims_b64, "claims")?;

        URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| TokenError::Malformed(format!("signature is not base64url: {}", e)))?;

        Ok(Token {
            header,
            claims,
            signing_input: format!("{}.{}", header_b64, claims_b64),
            signature: signature.to_string(),
        })
    }

    /// True iff the token was signed by our key with our algorithm and has
    /// not yet expired.
    pub fn is_valid(&self, token: &Token) -> bool {
        self.is_valid_at(token, Utc::now())
    }

    pub fn is_valid_at(&self, token: &Token, now: DateTime<Utc>) -> bool {
        if token.header.alg != self.verifier.algorithm() {
            debug!(alg = ?token.header.alg, "Token algorithm does not match verifier");
            return false;
        }

        if let Err(e) = self
            .verifier
            .verify(token.signing_input.as_bytes(), &token.signature)
        {
            debug!("Token signature rejected: {}", e);
            return false;
        }

        if token.is_expired_at(now) {
            debug!(exp = token.claims.exp, "Token expired");
            return false;
        }

        true
    }

    /// Identity embedded in the token. Does not check signature or expiry;
    /// call [`is_valid`](Self::is_valid) first.
    pub fn decode_identity(&self, token: &Token) -> Result<Identity, TokenError> {
        serde_json::from_value(token.claims.user.clone())
            .map_err(|e| TokenError::Claims(format!("user claim is not an identity: {}", e)))
    }
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)
        .map_err(|e| TokenError::Claims(format!("Failed to encode token segment: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: for<'de> Deserialize<'de>>(
    segment: &str,
    name: &str,
) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("{} is not base64url: {}", name, e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("{} is not valid JSON: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_key_pair, test_token_service, OTHER_PUBLIC_KEY, TEST_ISSUER};
    use crate::token::VerifyingKey;

    fn identity() -> Identity {
        Identity::new(
            "jdoe",
            "uid=jdoe,ou=people,dc=example,dc=com",
            vec!["platform-admins".to_string(), "developers".to_string()],
        )
    }

    #[test]
    fn test_issue_parse_round_trip() {
        let service = test_token_service();
        let token = service.issue(&identity(), Duration::minutes(10)).unwrap();
        let bearer = service.serialize(&token);

        assert_eq!(bearer.matches('.').count(), 2);

        let parsed = service.parse(&bearer).unwrap();
        assert_eq!(service.serialize(&parsed), bearer);
        assert_eq!(parsed.claims(), token.claims());
        assert_eq!(parsed.header().alg, Algorithm::RS256);
        assert_eq!(parsed.claims().iss, TEST_ISSUER);
        assert!(service.is_valid(&parsed));
        assert_eq!(service.decode_identity(&parsed).unwrap(), identity());
    }

    #[test]
    fn test_expiration_is_in_the_future() {
        let service = test_token_service();
        let before = Utc::now();
        let token = service.issue(&identity(), Duration::minutes(10)).unwrap();

        assert!(token.expiration() > before);
        assert!(token.expiration() <= Utc::now() + Duration::minutes(10));
        assert_eq!(token.claims().exp - token.claims().iat, 600);
    }

    #[test]
    fn test_out_of_range_lifetime_fails_closed() {
        let service = test_token_service();

        for ttl in [Duration::seconds(10_000_000_000_000), Duration::MAX] {
            assert!(matches!(
                service.issue(&identity(), ttl),
                Err(TokenError::Claims(_))
            ));
        }
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let service = test_token_service();
        let token = service.issue(&identity(), Duration::seconds(-1)).unwrap();
        let parsed = service.parse(&service.serialize(&token)).unwrap();

        assert!(!service.is_valid(&parsed));
        // Still decodable: expiry is a validity question, not a format one
        assert_eq!(service.decode_identity(&parsed).unwrap(), identity());
    }

    #[test]
    fn test_expiry_boundary_is_strict() {
        let service = test_token_service();
        let token = service.issue(&identity(), Duration::minutes(1)).unwrap();
        let exp = token.expiration();

        assert!(service.is_valid_at(&token, exp - Duration::seconds(1)));
        assert!(!service.is_valid_at(&token, exp));
    }

    #[test]
    fn test_altered_signature_is_invalid() {
        let service = test_token_service();
        let bearer = service.serialize(&service.issue(&identity(), Duration::minutes(10)).unwrap());

        let signature_start = bearer.rfind('.').unwrap() + 1;
        let target = signature_start + (bearer.len() - signature_start) / 2;
        let original = bearer.as_bytes()[target];
        let replacement = if original == b'A' { b'B' } else { b'A' };

        let mut tampered = bearer.into_bytes();
        tampered[target] = replacement;
        let tampered = String::from_utf8(tampered).unwrap();

        match service.parse(&tampered) {
            Ok(token) => assert!(!service.is_valid(&token)),
            Err(e) => assert!(matches!(e, TokenError::Malformed(_))),
        }
    }

    #[test]
    fn test_altered_claims_are_invalid() {
        let service = test_token_service();
        let bearer = service.serialize(&service.issue(&identity(), Duration::minutes(10)).unwrap());
        let parts: Vec<&str> = bearer.split('.').collect();

        let mut claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        claims["user"]["groups"] = serde_json::json!(["cluster-admins"]);
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap()),
            parts[2]
        );

        let token = service.parse(&forged).unwrap();
        assert!(!service.is_valid(&token));
    }

    #[test]
    fn test_other_key_does_not_verify() {
        let issuer = test_token_service();
        let bearer = issuer.serialize(&issuer.issue(&identity(), Duration::minutes(10)).unwrap());

        let stranger = TokenService::new(
            TEST_ISSUER,
            test_key_pair(),
            Arc::new(VerifyingKey::from_pem("RS256", OTHER_PUBLIC_KEY).unwrap()),
        );
        let token = stranger.parse(&bearer).unwrap();
        assert!(!stranger.is_valid(&token));
    }

    #[test]
    fn test_verifier_only_service() {
        let keys = test_key_pair();
        let issuer = TokenService::with_key_pair(TEST_ISSUER, keys.clone());
        let bearer = issuer.serialize(&issuer.issue(&identity(), Duration::minutes(10)).unwrap());

        let public = Arc::new(VerifyingKey::from_pem("RS256", crate::testutil::TEST_PUBLIC_KEY).unwrap());
        let reviewer = TokenService::new(TEST_ISSUER, keys, public);
        let token = reviewer.parse(&bearer).unwrap();
        assert!(reviewer.is_valid(&token));
    }

    #[test]
    fn test_algorithm_mismatch_is_invalid() {
        let service = test_token_service();
        let bearer = service.serialize(&service.issue(&identity(), Duration::minutes(10)).unwrap());
        let parts: Vec<&str> = bearer.split('.').collect();

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS512","typ":"JWT"}"#);
        let swapped = format!("{}.{}.{}", header, parts[1], parts[2]);

        let token = service.parse(&swapped).unwrap();
        assert!(!service.is_valid(&token));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let service = test_token_service();
        let claims = URL_SAFE_NO_PAD.encode(br#"{"iss":"x","iat":0,"exp":1,"user":{}}"#);
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);

        for bearer in [
            "".to_string(),
            "not-a-token".to_string(),
            "a.b".to_string(),
            "a.b.c.d".to_string(),
            format!("{}..sig", header),
            format!("!!!.{}.c2ln", claims),
            format!("{}.{}.!!!", header, claims),
            format!("{}.{}.c2ln", URL_SAFE_NO_PAD.encode(b"not json"), claims),
            format!("{}.{}.c2ln", header, URL_SAFE_NO_PAD.encode(br#"{"iss":"x"}"#)),
            format!("{}.{}.c2ln", URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#), claims),
        ] {
            assert!(
                matches!(service.parse(&bearer), Err(TokenError::Malformed(_))),
                "{bearer:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_decode_identity_rejects_foreign_user_claim() {
        let service = test_token_service();
        let claims = URL_SAFE_NO_PAD.encode(br#"{"iss":"x","iat":0,"exp":1,"user":"jdoe"}"#);
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);

        let token = service.parse(&format!("{}.{}.c2ln", header, claims)).unwrap();
        assert!(matches!(
            service.decode_identity(&token),
            Err(TokenError::Claims(_))
        ));
    }
}
