//! LDAP Client implementation
//!
//! Handles the connection, the service bind, the user search and the user
//! bind. Supports LDAP, LDAPS (SSL), and STARTTLS connections.

use crate::ldap::types::*;
use async_trait::async_trait;
use ldap3::{
    Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, Scope, SearchEntry, SearchResult,
};
use ldapgate_core::types::Identity;
use ldapgate_core::UID_ATTRIBUTE;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Anything that can turn a username/password pair into a verified identity
#[async_trait]
pub trait Directory: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str)
        -> Result<Identity, DirectoryError>;
}

/// The LDAP operations one authentication needs, over an open connection
#[async_trait]
pub(crate) trait Connection: Send {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<LdapResult, LdapError>;

    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[String],
    ) -> Result<(Vec<SearchEntry>, LdapResult), LdapError>;

    async fn unbind(&mut self) -> Result<(), LdapError>;
}

#[async_trait]
impl Connection for Ldap {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<LdapResult, LdapError> {
        Ldap::simple_bind(self, dn, password).await
    }

    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[String],
    ) -> Result<(Vec<SearchEntry>, LdapResult), LdapError> {
        let SearchResult(entries, result) =
            Ldap::search(self, base, scope, filter, attrs.to_vec()).await?;
        Ok((entries.into_iter().map(SearchEntry::construct).collect(), result))
    }

    async fn unbind(&mut self) -> Result<(), LdapError> {
        Ldap::unbind(self).await
    }
}

/// LDAP Client for password verification
pub struct LdapClient {
    config: LdapConfig,
}

impl LdapClient {
    /// Create a new LDAP client
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Create LDAP connection with proper TLS settings
    async fn create_connection(&self) -> Result<(LdapConnAsync, Ldap), DirectoryError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.timeout)
            .set_starttls(self.config.start_tls)
            .set_no_tls_verify(self.config.skip_tls_verify);

        debug!("Connecting to LDAP server: {}", self.config.server_url);

        LdapConnAsync::with_settings(settings, &self.config.server_url)
            .await
            .map_err(|e| DirectoryError::Connection(e.to_string()))
    }

    /// One connection per call. If the surrounding timeout drops this
    /// future, dropping the `Ldap` handle closes the connection.
    async fn ldap_authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, DirectoryError> {
        let (conn, mut ldap) = self.create_connection().await?;

        ldap3::drive!(conn);

        self.authenticate_on(&mut ldap, username, password).await
    }

    /// Run the bind/search/bind sequence, then unbind whatever the outcome
    async fn authenticate_on<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        username: &str,
        password: &str,
    ) -> Result<Identity, DirectoryError> {
        let result = self.bind_search_bind(conn, username, password).await;

        if let Err(e) = conn.unbind().await {
            debug!("LDAP unbind failed: {}", e);
        }

        result
    }

    async fn bind_search_bind<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        username: &str,
        password: &str,
    ) -> Result<Identity, DirectoryError> {
        // Step 1: Bind with service account
        conn.simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| DirectoryError::Bind(format!("service bind: {}", e)))?
            .success()
            .map_err(|e| DirectoryError::Bind(format!("service bind: {}", e)))?;

        // Step 2: Search for the user
        let filter = self.config.build_search_filter(username);

        debug!("Searching for user with filter: {}", filter);

        let (entries, result) = conn
            .search(
                &self.config.search_base,
                self.config.search_scope.into(),
                &filter,
                &self.config.search_attributes,
            )
            .await
            .map_err(|e| DirectoryError::Search(e.to_string()))?;
        result
            .success()
            .map_err(|e| DirectoryError::Search(e.to_string()))?;

        let entry = single_entry(entries)?;

        debug!("Found user DN: {}", entry.dn);

        // Step 3: Verify the password by binding as the user
        let user_bind = conn
            .simple_bind(&entry.dn, password)
            .await
            .map_err(|e| DirectoryError::Bind(format!("user bind: {}", e)))?;

        if user_bind.rc != 0 {
            debug!(rc = user_bind.rc, dn = %entry.dn, "User bind rejected");
            return Err(DirectoryError::InvalidCredentials);
        }

        identity_from_entry(&entry, &self.config.member_of_attribute)
    }
}

#[async_trait]
impl Directory for LdapClient {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, DirectoryError> {
        // A simple bind with an empty password is an anonymous bind, which
        // most servers accept.
        if password.is_empty() {
            return Err(DirectoryError::InvalidCredentials);
        }

        match tokio::time::timeout(
            self.config.timeout,
            self.ldap_authenticate(username, password),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    server = %self.config.server_url,
                    timeout = ?self.config.timeout,
                    "LDAP authentication timed out"
                );
                Err(DirectoryError::Timeout(self.config.timeout))
            }
        }
    }
}

/// Exactly one search result is accepted. Several matches are a directory
/// fault and fail for every matched entry.
pub fn single_entry(mut entries: Vec<SearchEntry>) -> Result<SearchEntry, DirectoryError> {
    match entries.len() {
        0 => Err(DirectoryError::UserNotFound),
        1 => Ok(entries.remove(0)),
        count => {
            warn!(
                count,
                dns = ?entries.iter().map(|e| e.dn.as_str()).collect::<Vec<_>>(),
                "Username matches several directory entries"
            );
            Err(DirectoryError::AmbiguousIdentity { count })
        }
    }
}

/// Build the identity for a verified entry
pub fn identity_from_entry(
    entry: &SearchEntry,
    member_of_attribute: &str,
) -> Result<Identity, DirectoryError> {
    let uid = get_attr(entry, UID_ATTRIBUTE)
        .and_then(|v| v.first())
        .ok_or_else(|| DirectoryError::MissingAttribute(UID_ATTRIBUTE.to_string()))?;

    let groups = get_attr(entry, member_of_attribute)
        .map(|values| values.iter().map(|v| group_name(v)).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    Ok(Identity::new(uid, &entry.dn, groups))
}

/// Extract the group name from a group DN such as
/// `cn=platform-admins,ou=groups,dc=example,dc=com`.
///
/// The value is lowercased first. Anything that does not start with a `cn=`
/// RDN is an error, as is a name containing an escaped character.
pub fn group_name(value: &str) -> Result<String, DirectoryError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^cn=([^,\\]+)(?:,|$)").expect("group pattern is a valid regex")
    });

    let lowered = value.trim().to_lowercase();
    pattern
        .captures(&lowered)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| DirectoryError::InvalidGroup(value.to_string()))
}

/// Attribute names are case-insensitive in LDAP
fn get_attr<'a>(entry: &'a SearchEntry, attr: &str) -> Option<&'a Vec<String>> {
    entry
        .attrs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(attr))
        .map(|(_, values)| values)
}
