//! Authentication for Ldapgate
//!
//! Two halves: the directory client proves a password by delegating the check
//! to an LDAP bind, and the token service turns the resulting identity into a
//! signed, time-bounded bearer token that can later be verified without the
//! directory.

pub mod ldap;
pub mod token;

pub use ldap::{Directory, DirectoryError, LdapClient, LdapConfig};
pub use token::{
    SigningKeyPair, Token, TokenError, TokenService, TokenSigner, TokenVerifier, VerifyingKey,
};

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
