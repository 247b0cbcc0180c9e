//! Identity token acquisition.
//!
//! Secure channels authenticate with a short-lived identity token issued for
//! a service account. The account is either named explicitly or read from
//! the ambient credentials file.

mod credentials;
mod error;
mod issuer;
mod provider;

pub use credentials::{FieldExtractor, JsonExtractor, ScanExtractor, CLIENT_EMAIL_FIELD};
pub use error::AuthError;
pub use issuer::{IamCredentialsIssuer, IdTokenIssuer, IdTokenRequest};
pub use provider::{IdentityTokenProvider, StaticToken, TokenSource};

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Environment variable naming the ambient credentials file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Environment variable holding an OAuth access token for the issuing service.
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Audience every identity token is scoped to.
pub const DEFAULT_AUDIENCE: &str = "https://aistreams.googleapis.com/";

/// Base URL of the identity-token-issuing service.
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iamcredentials.googleapis.com/";
