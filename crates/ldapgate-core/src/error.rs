//! Error types for Ldapgate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol Errors
    #[error("Content-Type must be application/json")]
    NotAcceptable,

    #[error("Failed to decode request body: {0}")]
    DecodeFailed(String),

    // Validation Errors
    #[error("Username and password must both be provided")]
    MalformedCredentials,

    // Authentication Errors
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    // Internal Errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotAcceptable => "NotAcceptable",
            Error::DecodeFailed(_) => "DecodeFailed",
            Error::MalformedCredentials => "MalformedCredentials",
            Error::Unauthorized => "Unauthorized",
            Error::MalformedToken(_) => "MalformedToken",
            Error::Internal(_) => "InternalError",
            Error::Config(_) => "InvalidConfiguration",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotAcceptable => 406,

            Error::DecodeFailed(_) | Error::MalformedCredentials => 400,

            Error::Unauthorized | Error::MalformedToken(_) => 401,

            _ => 500,
        }
    }

    /// Whether the failure is the caller's fault rather than the server's
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::NotAcceptable.http_status(), 406);
        assert_eq!(Error::DecodeFailed("eof".into()).http_status(), 400);
        assert_eq!(Error::MalformedCredentials.http_status(), 400);
        assert_eq!(Error::Unauthorized.http_status(), 401);
        assert_eq!(Error::MalformedToken("two segments".into()).http_status(), 401);
        assert_eq!(Error::Internal("signing failed".into()).http_status(), 500);
        assert_eq!(Error::Config("bad".into()).http_status(), 500);
    }

    #[test]
    fn test_unauthorized_message_is_generic() {
        assert_eq!(Error::Unauthorized.to_string(), "Unauthorized");
        assert!(Error::Unauthorized.is_client_error());
        assert!(!Error::Internal("x".into()).is_client_error());
    }
}
