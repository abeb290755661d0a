//! Error Types for Fixture Generation
//!
//! The run distinguishes four failure classes: fatal startup errors that abort
//! the whole run, per-user errors that drop one roster entry, store errors that
//! degrade a single query, and per-fixture errors that skip one output file.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort the run before or during startup
#[derive(Error, Debug)]
pub enum FatalError {
    // Credential input errors
    #[error("Failed to read credentials file {path}: {source}")]
    CredentialsFileUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Credentials file is not valid JSON: {0}")]
    CredentialsFileMalformed(String),

    #[error("Credentials file contains no usable entries")]
    NoCredentials,

    // Roster errors
    #[error("No users authenticated ({attempted} attempted); nothing to generate")]
    NoAuthenticatedUsers { attempted: usize },

    // Store errors
    #[error("Relational store unavailable: {0}")]
    RelationalStoreUnavailable(String),

    // Output errors
    #[error("Failed to create output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FatalError {
    /// Process exit code reported by the binaries
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::Configuration(_) => 2,
            _ => 1,
        }
    }
}

/// Result type for operations that can abort the run
pub type FatalResult<T> = Result<T, FatalError>;

/// Errors that fail a single user's authentication or resolution
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token request failed: {0}")]
    Request(String),

    #[error("Token request rejected with status {status}: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Token response carried no recognized token field")]
    TokenMissing,

    #[error("Token decode failed: {0}")]
    TokenDecode(#[from] TokenDecodeError),
}

/// Result type for per-user authentication steps
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that make an access token undecodable
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenDecodeError {
    #[error("Token is not a three-segment JWT")]
    MalformedToken,

    #[error("Token payload is not valid base64url")]
    PayloadEncoding,

    #[error("Token payload is not a JSON object")]
    PayloadJson,

    #[error("Token payload carries no subject claim")]
    SubjectMissing,

    #[error("Token subject claim is not a positive user id: {0}")]
    SubjectInvalid(String),
}

/// Errors from the backing stores; a failed query degrades, it never aborts
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Relational query failed: {0}")]
    Relational(#[from] sqlx::Error),

    #[error("Document query failed: {0}")]
    Document(#[from] mongodb::error::Error),

    #[error("Document store is not connected")]
    DocumentUnavailable,
}

/// Result type for store queries
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that fail a single account during provisioning
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Account creation request failed: {0}")]
    Request(String),

    #[error("Account creation rejected with status {status}: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Account response carried no initial password")]
    InitialPasswordMissing,

    #[error("Initial login failed: {0}")]
    InitialLogin(#[from] AuthError),

    #[error("Password change rejected with status {status}: {detail}")]
    PasswordChangeRejected { status: u16, detail: String },
}

// Conversions from common error types
impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Request(err.to_string())
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        ProvisionError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for FatalError {
    fn from(err: serde_json::Error) -> Self {
        FatalError::CredentialsFileMalformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            FatalError::Configuration("bad flag".to_string()).exit_code(),
            2
        );
        assert_eq!(
            FatalError::NoAuthenticatedUsers { attempted: 3 }.exit_code(),
            1
        );
        assert_eq!(
            FatalError::RelationalStoreUnavailable("refused".to_string()).exit_code(),
            1
        );
    }

    #[test]
    fn test_token_decode_into_auth() {
        let err: AuthError = TokenDecodeError::SubjectMissing.into();
        assert!(matches!(
            err,
            AuthError::TokenDecode(TokenDecodeError::SubjectMissing)
        ));
    }

    #[test]
    fn test_display_messages() {
        let err = FatalError::NoAuthenticatedUsers { attempted: 7 };
        assert_eq!(
            err.to_string(),
            "No users authenticated (7 attempted); nothing to generate"
        );

        let err = TokenDecodeError::SubjectInvalid("-4".to_string());
        assert!(err.to_string().contains("-4"));
    }
}
