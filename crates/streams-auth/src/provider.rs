//! Identity token resolution.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::credentials::{FieldExtractor, ScanExtractor, CLIENT_EMAIL_FIELD};
use crate::error::AuthError;
use crate::issuer::{IamCredentialsIssuer, IdTokenIssuer, IdTokenRequest};
use crate::{AuthResult, CREDENTIALS_ENV, DEFAULT_AUDIENCE};

/// Anything that can hand out a bearer token for channel setup.
pub trait TokenSource: Send + Sync {
    /// Obtain a token. Called once per channel setup.
    fn token(&self) -> AuthResult<String>;
}

/// A fixed token, for pre-provisioned credentials and tests.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> AuthResult<String> {
        Ok(self.0.clone())
    }
}

/// Resolves identity tokens for an explicit or ambient service account.
pub struct IdentityTokenProvider<I> {
    issuer: I,
    audience: String,
    principal: Option<String>,
    extractor: Box<dyn FieldExtractor>,
}

impl IdentityTokenProvider<IamCredentialsIssuer> {
    /// Provider backed by the public IAM credentials service.
    pub fn from_env() -> AuthResult<Self> {
        Ok(Self::new(IamCredentialsIssuer::from_env()?))
    }
}

impl<I: IdTokenIssuer> IdentityTokenProvider<I> {
    /// Create a provider that infers the service account from the
    /// ambient credentials file.
    pub fn new(issuer: I) -> Self {
        Self {
            issuer,
            audience: DEFAULT_AUDIENCE.to_string(),
            principal: None,
            extractor: Box::new(ScanExtractor),
        }
    }

    /// Always issue tokens for this service account.
    pub fn with_principal(mut self, service_account: impl Into<String>) -> Self {
        self.principal = Some(service_account.into());
        self
    }

    /// Override the token audience.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Swap the credentials field extractor.
    pub fn with_extractor(mut self, extractor: impl FieldExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Issue a token for the given service account.
    #[instrument(name = "get_id_token", skip(self))]
    pub fn get_id_token(&self, service_account: &str) -> AuthResult<String> {
        if service_account.is_empty() {
            return Err(AuthError::EmptyServiceAccount);
        }

        let request = IdTokenRequest {
            service_account: service_account.to_string(),
            audience: self.audience.clone(),
            include_email: true,
        };

        let token = self.issuer.generate_id_token(&request)?;
        info!("Obtained identity token");
        Ok(token)
    }

    /// Issue a token for the service account named in the ambient
    /// credentials file.
    pub fn get_id_token_with_default_service_account(&self) -> AuthResult<String> {
        let path = std::env::var_os(CREDENTIALS_ENV)
            .filter(|p| !p.is_empty())
            .ok_or(AuthError::MissingEnvironment(CREDENTIALS_ENV))?;

        self.get_id_token_from_credentials_file(Path::new(&path))
    }

    /// Issue a token for the service account named in a credentials file.
    pub fn get_id_token_from_credentials_file(&self, path: &Path) -> AuthResult<String> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| AuthError::UnreadableCredentials {
                path: path.to_path_buf(),
                source,
            })?;

        let service_account = self.extractor.extract(&contents, CLIENT_EMAIL_FIELD)?;
        debug!(account = %service_account, "Resolved default service account");

        self.get_id_token(&service_account)
    }
}

impl<I: IdTokenIssuer> TokenSource for IdentityTokenProvider<I> {
    fn token(&self) -> AuthResult<String> {
        match self.principal {
            Some(ref principal) => self.get_id_token(principal),
            None => self.get_id_token_with_default_service_account(),
        }
    }
}
