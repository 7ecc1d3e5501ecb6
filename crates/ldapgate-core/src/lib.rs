//! Ldapgate Core Library
//!
//! Configuration, error taxonomy, and the identity and Kubernetes wire types
//! shared by the directory client, the token service, and the HTTP server.

pub mod config;
pub mod error;
pub mod types;

pub use config::GatewayConfig;
pub use error::{Error, Result};

/// Ldapgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Placeholder substituted with the escaped username in the search filter
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Directory attribute holding the user id
pub const UID_ATTRIBUTE: &str = "uid";

/// Media type both endpoints accept and produce
pub const CONTENT_TYPE_JSON: &str = "application/json";
