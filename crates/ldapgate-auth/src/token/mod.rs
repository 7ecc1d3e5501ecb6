//! Bearer token issuance and verification
//!
//! Tokens are compact JWS strings signed with an asymmetric key. Anyone with
//! the public key can check them; only the holder of the private key can mint
//! them. Nothing about an issued token is stored server side.

mod keys;
mod service;

pub use keys::{SigningKeyPair, TokenSigner, TokenVerifier, VerifyingKey};
pub use service::{Token, TokenClaims, TokenHeader, TokenService};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    /// Structural problem with the bearer string
    #[error("{0}")]
    Malformed(String),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Key error: {0}")]
    Key(String),

    /// Well-formed, signed token whose claims do not hold an identity
    #[error("Invalid claims: {0}")]
    Claims(String),
}
