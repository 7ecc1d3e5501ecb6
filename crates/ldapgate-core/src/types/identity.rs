//! Credentials and identities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Username/password pair submitted to the exchange endpoint
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields must be non-empty
    pub fn is_valid(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

// Keeps the password out of logs and panics.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A directory-verified user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Lowercased `uid` attribute
    pub uid: String,
    /// Lowercased distinguished name of the entry
    pub dn: String,
    /// Group names, in directory order
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Identity {
    /// Build an identity, lowercasing uid and DN so comparisons are
    /// case-insensitive.
    pub fn new(uid: &str, dn: &str, groups: Vec<String>) -> Self {
        Self {
            uid: uid.to_lowercase(),
            dn: dn.to_lowercase(),
            groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_validity() {
        assert!(Credentials::new("jdoe", "hunter2").is_valid());
        assert!(!Credentials::new("", "hunter2").is_valid());
        assert!(!Credentials::new("jdoe", "").is_valid());
        assert!(!Credentials::default().is_valid());
    }

    #[test]
    fn test_credentials_missing_fields_decode_as_empty() {
        let creds: Credentials = serde_json::from_str(r#"{"username":"jdoe"}"#).unwrap();
        assert_eq!(creds.username, "jdoe");
        assert!(!creds.is_valid());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("jdoe", "hunter2"));
        assert!(rendered.contains("jdoe"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_identity_lowercases() {
        let identity = Identity::new(
            "JDoe",
            "UID=JDoe,OU=People,DC=Example,DC=Com",
            vec!["admins".to_string()],
        );
        assert_eq!(identity.uid, "jdoe");
        assert_eq!(identity.dn, "uid=jdoe,ou=people,dc=example,dc=com");
        assert_eq!(identity.groups, vec!["admins"]);
    }
}
