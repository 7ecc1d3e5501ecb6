//! Kubernetes client-authentication and authentication API objects
//!
//! Only the fields the exchange and review endpoints read or write are
//! modelled. Unknown fields in requests are ignored.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::Identity;

pub const EXEC_CREDENTIAL_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";
pub const EXEC_CREDENTIAL_KIND: &str = "ExecCredential";
pub const TOKEN_REVIEW_API_VERSION: &str = "authentication.k8s.io/v1";
pub const TOKEN_REVIEW_KIND: &str = "TokenReview";

// ============================================================================
// ExecCredential
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredential {
    pub api_version: String,
    pub kind: String,
    pub status: ExecCredentialStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredentialStatus {
    pub token: String,
    /// RFC 3339, second precision
    pub expiration_timestamp: String,
}

impl ExecCredential {
    pub fn new(token: String, expiration: DateTime<Utc>) -> Self {
        Self {
            api_version: EXEC_CREDENTIAL_API_VERSION.to_string(),
            kind: EXEC_CREDENTIAL_KIND.to_string(),
            status: ExecCredentialStatus {
                token,
                expiration_timestamp: expiration.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
        }
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.status.expiration_timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

// ============================================================================
// TokenReview
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReview {
    #[serde(default = "default_review_api_version")]
    pub api_version: String,
    #[serde(default = "default_review_kind")]
    pub kind: String,
    pub spec: TokenReviewSpec,
    #[serde(default)]
    pub status: TokenReviewStatus,
}

fn default_review_api_version() -> String {
    TOKEN_REVIEW_API_VERSION.to_string()
}

fn default_review_kind() -> String {
    TOKEN_REVIEW_KIND.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenReviewSpec {
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenReviewStatus {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

impl TokenReviewStatus {
    pub fn authenticated(identity: Identity) -> Self {
        Self {
            authenticated: true,
            user: Some(identity.into()),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::default()
    }
}

/// User as seen by the Kubernetes API server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub uid: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl From<Identity> for UserInfo {
    fn from(identity: Identity) -> Self {
        Self {
            username: identity.uid,
            uid: identity.dn,
            groups: identity.groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_exec_credential_shape() {
        let expiration = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let credential = ExecCredential::new("abc.def.ghi".to_string(), expiration);

        let json = serde_json::to_value(&credential).unwrap();
        assert_eq!(json["apiVersion"], EXEC_CREDENTIAL_API_VERSION);
        assert_eq!(json["kind"], "ExecCredential");
        assert_eq!(json["status"]["token"], "abc.def.ghi");
        assert_eq!(json["status"]["expirationTimestamp"], "2030-01-02T03:04:05Z");
        assert_eq!(credential.expiration(), Some(expiration));
    }

    #[test]
    fn test_token_review_minimal_request() {
        let review: TokenReview =
            serde_json::from_str(r#"{"spec":{"token":"abc"}}"#).unwrap();
        assert_eq!(review.spec.token, "abc");
        assert_eq!(review.api_version, TOKEN_REVIEW_API_VERSION);
        assert_eq!(review.kind, TOKEN_REVIEW_KIND);
        assert!(!review.status.authenticated);
    }

    #[test]
    fn test_token_review_requires_spec() {
        assert!(serde_json::from_str::<TokenReview>(r#"{"kind":"TokenReview"}"#).is_err());
    }

    #[test]
    fn test_unauthenticated_status_omits_user() {
        let json = serde_json::to_value(TokenReviewStatus::unauthenticated()).unwrap();
        assert_eq!(json, serde_json::json!({ "authenticated": false }));
    }

    #[test]
    fn test_user_info_mapping() {
        let identity = Identity::new(
            "jdoe",
            "uid=jdoe,ou=people,dc=example,dc=com",
            vec!["platform-admins".to_string()],
        );
        let status = TokenReviewStatus::authenticated(identity);
        let user = status.user.unwrap();
        assert_eq!(user.username, "jdoe");
        assert_eq!(user.uid, "uid=jdoe,ou=people,dc=example,dc=com");
        assert_eq!(user.groups, vec!["platform-admins"]);
    }
}
