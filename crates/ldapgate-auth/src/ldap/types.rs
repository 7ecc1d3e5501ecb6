//! Directory configuration and errors

use ldap3::Scope;
use ldapgate_core::config::LdapConfigSection;
use ldapgate_core::USERNAME_PLACEHOLDER;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// LDAP Configuration
// ============================================================================

/// Directory settings consumed by [`LdapClient`](super::LdapClient).
/// Immutable once the client is built.
#[derive(Debug, Clone)]
pub struct LdapConfig {
    /// LDAP server URL (ldap:// or ldaps://)
    pub server_url: String,

    /// Use STARTTLS for connection upgrade
    pub start_tls: bool,

    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,

    /// Service account used for the search
    pub bind_dn: String,
    pub bind_password: String,

    /// Base DN for user searches
    pub search_base: String,

    pub search_scope: SearchScope,

    /// Filter template, `{username}` is replaced by the escaped username
    /// Example: "(&(objectClass=inetOrgPerson)(uid={username}))"
    pub search_filter: String,

    /// Attribute whose values are the DNs of the user's groups
    pub member_of_attribute: String,

    /// Attributes requested with the user entry
    pub search_attributes: Vec<String>,

    /// Bound on the full bind/search/bind round trip
    pub timeout: Duration,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self::from(&LdapConfigSection::default())
    }
}

impl From<&LdapConfigSection> for LdapConfig {
    fn from(section: &LdapConfigSection) -> Self {
        Self {
            server_url: section.server_url.clone(),
            start_tls: section.start_tls,
            skip_tls_verify: section.skip_tls_verify,
            bind_dn: section.bind_dn.clone(),
            bind_password: section.bind_password.clone(),
            search_base: section.search_base.clone(),
            search_scope: SearchScope::parse(&section.search_scope).unwrap_or_default(),
            search_filter: section.search_filter.clone(),
            member_of_attribute: section.member_of_attribute.clone(),
            search_attributes: section.search_attributes.clone(),
            timeout: Duration::from_secs(section.timeout_seconds),
        }
    }
}

impl LdapConfig {
    /// Build the user search filter. The username is escaped per RFC 4515 so
    /// it can only ever match as a literal value.
    pub fn build_search_filter(&self, username: &str) -> String {
        self.search_filter
            .replace(USERNAME_PLACEHOLDER, &ldap3::ldap_escape(username))
    }
}

/// Search scope relative to the search base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// The base entry only
    Base,
    /// Immediate children of the base
    OneLevel,
    /// The base and everything below it
    #[default]
    Subtree,
}

impl SearchScope {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "base" => Some(Self::Base),
            "one" => Some(Self::OneLevel),
            "sub" => Some(Self::Subtree),
            _ => None,
        }
    }
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Everything that can stop a directory authentication.
///
/// These never reach the HTTP caller individually; the exchange endpoint
/// reports all of them as one "unauthorized" outcome.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Failed to connect to LDAP server: {0}")]
    Connection(String),

    #[error("LDAP bind failed: {0}")]
    Bind(String),

    #[error("LDAP search failed: {0}")]
    Search(String),

    #[error("No directory entry matches the username")]
    UserNotFound,

    #[error("{count} directory entries match one username")]
    AmbiguousIdentity { count: usize },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Group value does not start with cn=<name>: {0}")]
    InvalidGroup(String),

    #[error("Directory entry has no {0} attribute")]
    MissingAttribute(String),

    #[error("Directory did not answer within {0:?}")]
    Timeout(Duration),
}

impl DirectoryError {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DirectoryError::Connection(_) => "connection",
            DirectoryError::Bind(_) => "bind",
            DirectoryError::Search(_) => "search",
            DirectoryError::UserNotFound => "user_not_found",
            DirectoryError::AmbiguousIdentity { .. } => "ambiguous_identity",
            DirectoryError::InvalidCredentials => "invalid_credentials",
            DirectoryError::InvalidGroup(_) => "invalid_group",
            DirectoryError::MissingAttribute(_) => "missing_attribute",
            DirectoryError::Timeout(_) => "timeout",
        }
    }

    /// Faults in the directory or its data, as opposed to a caller presenting
    /// wrong credentials.
    pub fn is_directory_fault(&self) -> bool {
        !matches!(
            self,
            DirectoryError::UserNotFound | DirectoryError::InvalidCredentials
        )
    }
}
