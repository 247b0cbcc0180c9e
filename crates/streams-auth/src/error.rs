//! Error types for the auth module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while acquiring an identity token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credentials environment variable is not set.
    #[error("{0} is not set; point it at a service account key file")]
    MissingEnvironment(&'static str),

    /// The credentials file could not be read.
    #[error("Failed to read credentials file {}: {source}", .path.display())]
    UnreadableCredentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The requested field does not appear in the credentials file.
    #[error("Failed to find {field} in the credentials file")]
    FieldNotFound { field: String },

    /// No colon follows the field name.
    #[error("Failed to find colon(:) after position {position}; the credentials file is malformed")]
    MissingColon { position: usize },

    /// No comma terminates the field value.
    #[error("Failed to find comma(,) after position {position}; the credentials file is malformed")]
    MissingComma { position: usize },

    /// The credentials file is not a valid structured document.
    #[error("Malformed credentials file: {0}")]
    MalformedCredentials(String),

    /// The service account name is empty.
    #[error("Service account must not be empty")]
    EmptyServiceAccount,

    /// The issuing service could not be reached.
    #[error("Identity token service unavailable: {0}")]
    IssuerUnavailable(String),

    /// The issuing service rejected the request.
    #[error("Identity token service returned {status}: {message}")]
    Issuer { status: u16, message: String },

    /// The issuing service answered with something that is not a token.
    #[error("Invalid identity token response: {0}")]
    InvalidResponse(String),
}
