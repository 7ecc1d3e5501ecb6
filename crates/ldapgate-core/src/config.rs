//! Configuration for Ldapgate

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{UID_ATTRIBUTE, USERNAME_PLACEHOLDER};

/// Signing algorithms accepted for bearer tokens. Shared-secret (HS*)
/// algorithms are not accepted.
pub const ASYMMETRIC_ALGORITHMS: &[&str] = &[
    "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256", "ES384", "EdDSA",
];

/// Upper bound for `token.ttl_seconds` (24 hours)
pub const MAX_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Accepted values for `ldap.search_scope`
pub const SEARCH_SCOPES: &[&str] = &["base", "one", "sub"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub ldap: LdapConfigSection,

    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("LDAPGATE_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        if let Ok(port) = std::env::var("LDAPGATE_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }
        if let Ok(secs) = std::env::var("LDAPGATE_REQUEST_TIMEOUT") {
            if let Ok(s) = secs.parse() {
                config.server.request_timeout_secs = s;
            }
        }

        // Directory
        if let Ok(url) = std::env::var("LDAPGATE_LDAP_URL") {
            config.ldap.server_url = url;
        }
        if std::env::var("LDAPGATE_LDAP_START_TLS").map(|v| v == "true").unwrap_or(false) {
            config.ldap.start_tls = true;
        }
        if std::env::var("LDAPGATE_LDAP_SKIP_TLS_VERIFY").map(|v| v == "true").unwrap_or(false) {
            config.ldap.skip_tls_verify = true;
        }
        if let Ok(dn) = std::env::var("LDAPGATE_LDAP_BIND_DN") {
            config.ldap.bind_dn = dn;
        }
        if let Ok(password) = std::env::var("LDAPGATE_LDAP_BIND_PASSWORD") {
            config.ldap.bind_password = password;
        }
        if let Ok(base) = std::env::var("LDAPGATE_LDAP_SEARCH_BASE") {
            config.ldap.search_base = base;
        }
        if let Ok(scope) = std::env::var("LDAPGATE_LDAP_SEARCH_SCOPE") {
            config.ldap.search_scope = scope;
        }
        if let Ok(filter) = std::env::var("LDAPGATE_LDAP_SEARCH_FILTER") {
            config.ldap.search_filter = filter;
        }
        if let Ok(attr) = std::env::var("LDAPGATE_LDAP_MEMBER_OF_ATTRIBUTE") {
            config.ldap.member_of_attribute = attr;
        }
        if let Ok(attrs) = std::env::var("LDAPGATE_LDAP_SEARCH_ATTRIBUTES") {
            config.ldap.search_attributes = split_list(&attrs);
        }
        if let Ok(secs) = std::env::var("LDAPGATE_LDAP_TIMEOUT") {
            if let Ok(s) = secs.parse() {
                config.ldap.timeout_seconds = s;
            }
        }

        // Tokens
        if let Ok(issuer) = std::env::var("LDAPGATE_TOKEN_ISSUER") {
            config.token.issuer = issuer;
        }
        if let Ok(ttl) = std::env::var("LDAPGATE_TOKEN_TTL") {
            if let Ok(t) = ttl.parse() {
                config.token.ttl_seconds = t;
            }
        }
        if let Ok(alg) = std::env::var("LDAPGATE_TOKEN_ALGORITHM") {
            config.token.algorithm = alg;
        }
        if let Ok(path) = std::env::var("LDAPGATE_TOKEN_PRIVATE_KEY") {
            config.token.private_key_file = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("LDAPGATE_TOKEN_PUBLIC_KEY") {
            config.token.public_key_file = Some(PathBuf::from(path));
        }

        if let Ok(level) = std::env::var("LDAPGATE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("LDAPGATE_LOG_FORMAT") {
            config.logging.format = format;
        }

        config
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.ldap.validate()?;
        self.token.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Directory connection and search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfigSection {
    /// LDAP server URL (ldap:// or ldaps://)
    #[serde(default = "default_ldap_url")]
    pub server_url: String,

    /// Use STARTTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Service account DN used for the search
    #[serde(default)]
    pub bind_dn: String,

    /// Service account secret
    #[serde(default)]
    pub bind_password: String,

    /// Base DN for user searches
    #[serde(default)]
    pub search_base: String,

    /// base, one or sub
    #[serde(default = "default_search_scope")]
    pub search_scope: String,

    /// User search filter (use {username} placeholder)
    #[serde(default = "default_search_filter")]
    pub search_filter: String,

    /// Attribute listing the user's group DNs
    #[serde(default = "default_member_of_attr")]
    pub member_of_attribute: String,

    /// Attributes fetched with the user entry
    #[serde(default = "default_search_attributes")]
    pub search_attributes: Vec<String>,

    /// Upper bound for the whole bind/search/bind exchange
    #[serde(default = "default_ldap_timeout")]
    pub timeout_seconds: u64,
}

fn default_ldap_url() -> String {
    "ldap://localhost:389".to_string()
}

fn default_search_scope() -> String {
    "sub".to_string()
}

fn default_search_filter() -> String {
    "(&(objectClass=inetOrgPerson)(uid={username}))".to_string()
}

fn default_member_of_attr() -> String {
    "memberOf".to_string()
}

fn default_search_attributes() -> Vec<String> {
    vec![UID_ATTRIBUTE.to_string(), default_member_of_attr()]
}

fn default_ldap_timeout() -> u64 {
    10
}

impl Default for LdapConfigSection {
    fn default() -> Self {
        Self {
            server_url: default_ldap_url(),
            start_tls: false,
            skip_tls_verify: false,
            bind_dn: String::new(),
            bind_password: String::new(),
            search_base: String::new(),
            search_scope: default_search_scope(),
            search_filter: default_search_filter(),
            member_of_attribute: default_member_of_attr(),
            search_attributes: default_search_attributes(),
            timeout_seconds: default_ldap_timeout(),
        }
    }
}

impl LdapConfigSection {
    pub fn validate(&self) -> crate::Result<()> {
        if !self.server_url.starts_with("ldap://") && !self.server_url.starts_with("ldaps://") {
            return Err(crate::Error::Config(
                "ldap.server_url must start with ldap:// or ldaps://".into(),
            ));
        }
        if self.bind_dn.is_empty() {
            return Err(crate::Error::Config("ldap.bind_dn is required".into()));
        }
        if self.search_base.is_empty() {
            return Err(crate::Error::Config("ldap.search_base is required".into()));
        }
        if !self.search_filter.contains(USERNAME_PLACEHOLDER) {
            return Err(crate::Error::Config(format!(
                "ldap.search_filter must contain the {} placeholder",
                USERNAME_PLACEHOLDER
            )));
        }
        if !SEARCH_SCOPES.contains(&self.search_scope.as_str()) {
            return Err(crate::Error::Config(format!(
                "ldap.search_scope must be one of {:?}, got {:?}",
                SEARCH_SCOPES, self.search_scope
            )));
        }
        if self.member_of_attribute.is_empty() {
            return Err(crate::Error::Config(
                "ldap.member_of_attribute is required".into(),
            ));
        }
        for required in [UID_ATTRIBUTE, self.member_of_attribute.as_str()] {
            if !self
                .search_attributes
                .iter()
                .any(|a| a.eq_ignore_ascii_case(required))
            {
                return Err(crate::Error::Config(format!(
                    "ldap.search_attributes must include {:?}",
                    required
                )));
            }
        }
        if self.timeout_seconds == 0 {
            return Err(crate::Error::Config(
                "ldap.timeout_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Bearer token issuance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Value of the `iss` claim
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Lifetime of issued tokens
    #[serde(default = "default_token_ttl")]
    pub ttl_seconds: u64,

    /// JWS algorithm
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// PEM private key. An ephemeral key is generated when unset.
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// PEM public key matching `private_key_file`
    #[serde(default)]
    pub public_key_file: Option<PathBuf>,
}

fn default_issuer() -> String {
    "ldapgate".to_string()
}

fn default_token_ttl() -> u64 {
    600 // 10 minutes
}

fn default_algorithm() -> String {
    "RS256".to_string()
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            ttl_seconds: default_token_ttl(),
            algorithm: default_algorithm(),
            private_key_file: None,
            public_key_file: None,
        }
    }
}

impl TokenConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.ttl_seconds == 0 {
            return Err(crate::Error::Config(
                "token.ttl_seconds must be greater than zero".into(),
            ));
        }
        if self.ttl_seconds > MAX_TOKEN_TTL_SECONDS {
            return Err(crate::Error::Config(format!(
                "token.ttl_seconds must be at most {}, got {}",
                MAX_TOKEN_TTL_SECONDS, self.ttl_seconds
            )));
        }
        if !ASYMMETRIC_ALGORITHMS.contains(&self.algorithm.as_str()) {
            return Err(crate::Error::Config(format!(
                "token.algorithm must be an asymmetric algorithm ({}), got {:?}",
                ASYMMETRIC_ALGORITHMS.join(", "),
                self.algorithm
            )));
        }
        match (&self.private_key_file, &self.public_key_file) {
            (Some(_), None) | (None, Some(_)) => Err(crate::Error::Config(
                "token.private_key_file and token.public_key_file must be set together".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether key material must be generated at startup
    pub fn uses_ephemeral_key(&self) -> bool {
        self.private_key_file.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_ldap() -> LdapConfigSection {
        LdapConfigSection {
            bind_dn: "cn=admin,dc=example,dc=com".to_string(),
            bind_password: "admin".to_string(),
            search_base: "ou=people,dc=example,dc=com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_are_not_deployable() {
        let config = GatewayConfig::default();
        // No bind DN or search base out of the box
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ldap_validation() {
        let mut ldap = valid_ldap();
        assert!(ldap.validate().is_ok());

        ldap.search_filter = "(uid=%s)".to_string();
        assert!(ldap.validate().is_err());

        let mut ldap = valid_ldap();
        ldap.search_scope = "subtree".to_string();
        assert!(ldap.validate().is_err());

        let mut ldap = valid_ldap();
        ldap.server_url = "http://ldap.example.com".to_string();
        assert!(ldap.validate().is_err());

        let mut ldap = valid_ldap();
        ldap.search_attributes = vec!["uid".to_string()];
        assert!(ldap.validate().is_err());

        let mut ldap = valid_ldap();
        ldap.search_attributes = vec!["UID".to_string(), "memberof".to_string()];
        assert!(ldap.validate().is_ok());

        let mut ldap = valid_ldap();
        ldap.timeout_seconds = 0;
        assert!(ldap.validate().is_err());
    }

    #[test]
    fn test_token_validation() {
        let mut token = TokenConfig::default();
        assert!(token.validate().is_ok());
        assert!(token.uses_ephemeral_key());

        token.algorithm = "HS256".to_string();
        assert!(token.validate().is_err());

        let mut token = TokenConfig::default();
        token.ttl_seconds = 0;
        assert!(token.validate().is_err());

        token.ttl_seconds = MAX_TOKEN_TTL_SECONDS;
        assert!(token.validate().is_ok());
        token.ttl_seconds = MAX_TOKEN_TTL_SECONDS + 1;
        assert!(token.validate().is_err());
        token.ttl_seconds = 10_000_000_000_000;
        assert!(matches!(token.validate(), Err(crate::Error::Config(_))));

        let mut token = TokenConfig::default();
        token.private_key_file = Some(PathBuf::from("/etc/ldapgate/key.pem"));
        assert!(token.validate().is_err());
        token.public_key_file = Some(PathBuf::from("/etc/ldapgate/key.pub.pem"));
        assert!(token.validate().is_ok());
        assert!(!token.uses_ephemeral_key());
    }

    #[test]
    fn test_parse_toml() {
        let config = GatewayConfig::from_toml(
            r#"
            [server]
            bind_address = "127.0.0.1"
            port = 8443
            request_timeout_secs = 5

            [ldap]
            server_url = "ldaps://ldap.example.com:636"
            bind_dn = "cn=svc,dc=example,dc=com"
            bind_password = "secret"
            search_base = "ou=people,dc=example,dc=com"
            search_scope = "one"

            [token]
            ttl_seconds = 300
            algorithm = "ES256"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.addr(), "127.0.0.1:8443");
        assert_eq!(config.ldap.search_scope, "one");
        assert_eq!(config.ldap.member_of_attribute, "memberOf");
        assert_eq!(config.ldap.search_attributes, vec!["uid", "memberOf"]);
        assert_eq!(config.token.ttl_seconds, 300);
        assert_eq!(config.token.issuer, "ldapgate");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_rejects_garbage() {
        assert!(GatewayConfig::from_toml("[server\nport = ").is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" uid, memberOf ,,cn"),
            vec!["uid".to_string(), "memberOf".to_string(), "cn".to_string()]
        );
    }
}
