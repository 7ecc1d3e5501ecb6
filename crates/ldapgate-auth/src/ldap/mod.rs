//! LDAP directory client
//!
//! Verifies a username/password pair with the classic three-step sequence:
//! - bind as the service account
//! - search for exactly one entry matching the username
//! - re-bind as that entry with the caller's password
//!
//! The password is never compared locally. Each authentication opens and
//! closes its own connection.

mod client;
mod types;

pub use client::{group_name, identity_from_entry, single_entry, Directory, LdapClient};
pub use types::*;
