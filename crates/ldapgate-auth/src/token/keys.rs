//! Signing key material
//!
//! [`TokenSigner`] and [`TokenVerifier`] are the only operations the token
//! service needs from a key. Key loading and algorithm choice stay behind
//! them.

use jsonwebtoken::{crypto, Algorithm, DecodingKey, EncodingKey};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use super::TokenError;

/// Produces JWS signatures over a signing input
pub trait TokenSigner: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// Sign `message`, returning the base64url encoded signature
    fn sign(&self, message: &[u8]) -> Result<String, TokenError>;
}

/// Checks JWS signatures produced by the matching [`TokenSigner`]
pub trait TokenVerifier: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// `Ok(())` only if `signature` is a valid signature of `message`
    fn verify(&self, message: &[u8], signature: &str) -> Result<(), TokenError>;
}

/// Asymmetric key pair able to both sign and verify
pub struct SigningKeyPair {
    algorithm: Algorithm,
    encoding: EncodingKey,
    verifying: VerifyingKey,
}

impl SigningKeyPair {
    /// Load a key pair from PEM text. RSA keys may be PKCS#1 or PKCS#8, EC
    /// and Ed25519 keys PKCS#8.
    pub fn from_pem(
        algorithm: &str,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<Self, TokenError> {
        let algorithm = parse_algorithm(algorithm)?;
        let private_pem = private_pem.trim().as_bytes();

        let encoding = match key_family(algorithm) {
            KeyFamily::Rsa => EncodingKey::from_rsa_pem(private_pem),
            KeyFamily::Ec => EncodingKey::from_ec_pem(private_pem),
            KeyFamily::Ed => EncodingKey::from_ed_pem(private_pem),
        }
        .map_err(|e| TokenError::Key(format!("Failed to parse private key: {}", e)))?;

        let verifying = VerifyingKey::with_algorithm(algorithm, public_pem)?;

        Ok(Self {
            algorithm,
            encoding,
            verifying,
        })
    }

    /// Load a key pair from PEM files
    pub fn from_files(
        algorithm: &str,
        private_key: &Path,
        public_key: &Path,
    ) -> Result<Self, TokenError> {
        let private_pem = std::fs::read_to_string(private_key).map_err(|e| {
            TokenError::Key(format!("Failed to read private key {:?}: {}", private_key, e))
        })?;
        let public_pem = std::fs::read_to_string(public_key).map_err(|e| {
            TokenError::Key(format!("Failed to read public key {:?}: {}", public_key, e))
        })?;

        let pair = Self::from_pem(algorithm, &private_pem, &public_pem)?;
        info!(algorithm = ?pair.algorithm, key = ?private_key, "Loaded token signing key");
        Ok(pair)
    }

    /// Generate a fresh ES256 key pair that lives only as long as the process
    pub fn generate_ephemeral() -> Result<Self, TokenError> {
        let key_pair = rcgen::KeyPair::generate()
            .map_err(|e| TokenError::Key(format!("Failed to generate key pair: {}", e)))?;

        Self::from_pem("ES256", &key_pair.serialize_pem(), &key_pair.public_key_pem())
    }

    /// The verification half, for handing to a verifier-only party
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying
    }
}

impl TokenSigner for SigningKeyPair {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn sign(&self, message: &[u8]) -> Result<String, TokenError> {
        crypto::sign(message, &self.encoding, self.algorithm)
            .map_err(|e| TokenError::Signature(format!("Failed to sign token: {}", e)))
    }
}

impl TokenVerifier for SigningKeyPair {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn verify(&self, message: &[u8], signature: &str) -> Result<(), TokenError> {
        self.verifying.verify(message, signature)
    }
}

/// Public key only. Verifies tokens but cannot mint them.
pub struct VerifyingKey {
    algorithm: Algorithm,
    decoding: DecodingKey,
}

impl VerifyingKey {
    pub fn from_pem(algorithm: &str, public_pem: &str) -> Result<Self, TokenError> {
        Self::with_algorithm(parse_algorithm(algorithm)?, public_pem)
    }

    fn with_algorithm(algorithm: Algorithm, public_pem: &str) -> Result<Self, TokenError> {
        let public_pem = public_pem.trim().as_bytes();

        let decoding = match key_family(algorithm) {
            KeyFamily::Rsa => DecodingKey::from_rsa_pem(public_pem),
            KeyFamily::Ec => DecodingKey::from_ec_pem(public_pem),
            KeyFamily::Ed => DecodingKey::from_ed_pem(public_pem),
        }
        .map_err(|e| TokenError::Key(format!("Failed to parse public key: {}", e)))?;

        Ok(Self {
            algorithm,
            decoding,
        })
    }
}

impl TokenVerifier for VerifyingKey {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn verify(&self, message: &[u8], signature: &str) -> Result<(), TokenError> {
        match crypto::verify(signature, message, &self.decoding, self.algorithm) {
            Ok(true) => Ok(()),
            Ok(false) => Err(TokenError::Signature("signature mismatch".to_string())),
            Err(e) => {
                debug!("Signature verification error: {}", e);
                Err(TokenError::Signature(e.to_string()))
            }
        }
    }
}

enum KeyFamily {
    Rsa,
    Ec,
    Ed,
}

fn key_family(algorithm: Algorithm) -> KeyFamily {
    match algorithm {
        Algorithm::ES256 | Algorithm::ES384 => KeyFamily::Ec,
        Algorithm::EdDSA => KeyFamily::Ed,
        _ => KeyFamily::Rsa,
    }
}

/// Parse an algorithm name, accepting asymmetric algorithms only
fn parse_algorithm(alg: &str) -> Result<Algorithm, TokenError> {
    let algorithm = Algorithm::from_str(alg)
        .map_err(|_| TokenError::Key(format!("Unsupported algorithm: {}", alg)))?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Err(TokenError::Key(format!(
            "Shared-secret algorithm {} cannot be used for bearer tokens",
            alg
        ))),
        _ => Ok(algorithm),
    }
}
