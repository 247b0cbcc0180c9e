//! Calls to the identity-token-issuing service.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use url::Url;

use crate::error::AuthError;
use crate::{AuthResult, ACCESS_TOKEN_ENV, DEFAULT_IAM_ENDPOINT};

/// A request for an identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTokenRequest {
    /// Service account email the token is issued for.
    pub service_account: String,

    /// Audience the token is scoped to.
    pub audience: String,

    /// Whether the token embeds the service account email.
    pub include_email: bool,
}

impl IdTokenRequest {
    /// Fully qualified resource name of the service account.
    pub fn resource_name(&self) -> String {
        format!("projects/-/serviceAccounts/{}", self.service_account)
    }
}

/// Something that can mint identity tokens.
pub trait IdTokenIssuer: Send + Sync {
    /// Issue a token for the request.
    fn generate_id_token(&self, request: &IdTokenRequest) -> AuthResult<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateIdTokenBody<'a> {
    audience: &'a str,
    include_email: bool,
}

#[derive(Deserialize)]
struct GenerateIdTokenResponse {
    token: String,
}

/// Issuer backed by the IAM credentials REST API.
pub struct IamCredentialsIssuer {
    client: reqwest::blocking::Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl IamCredentialsIssuer {
    /// Create an issuer for the public endpoint, picking up an access token
    /// from the environment when one is set.
    pub fn from_env() -> AuthResult<Self> {
        let mut issuer = Self::with_client(reqwest::blocking::Client::new(), DEFAULT_IAM_ENDPOINT)?;
        issuer.access_token = std::env::var(ACCESS_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        Ok(issuer)
    }

    /// Create an issuer with an explicit HTTP client and endpoint.
    pub fn with_client(client: reqwest::blocking::Client, endpoint: &str) -> AuthResult<Self> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| AuthError::IssuerUnavailable(format!("invalid endpoint {endpoint}: {e}")))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            client,
            endpoint,
            access_token: None,
        })
    }

    /// Authorize calls with an OAuth access token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn request_url(&self, request: &IdTokenRequest) -> AuthResult<Url> {
        let path = format!("v1/{}:generateIdToken", request.resource_name());
        self.endpoint
            .join(&path)
            .map_err(|e| AuthError::IssuerUnavailable(format!("invalid request path {path}: {e}")))
    }
}

impl IdTokenIssuer for IamCredentialsIssuer {
    #[instrument(name = "generate_id_token", skip(self, request), fields(account = %request.service_account))]
    fn generate_id_token(&self, request: &IdTokenRequest) -> AuthResult<String> {
        let url = self.request_url(request)?;
        debug!(url = %url, "Requesting identity token");

        let body = GenerateIdTokenBody {
            audience: &request.audience,
            include_email: request.include_email,
        };

        let mut call = self.client.post(url).json(&body);
        if let Some(ref token) = self.access_token {
            call = call.bearer_auth(token);
        }

        let response = call.send().map_err(|e| {
            error!("Identity token request failed: {}", e);
            AuthError::IssuerUnavailable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            error!(status = status.as_u16(), "Identity token service rejected the request");
            return Err(AuthError::Issuer {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateIdTokenResponse = response
            .json()
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        if parsed.token.is_empty() {
            return Err(AuthError::InvalidResponse("empty token".to_string()));
        }

        Ok(parsed.token)
    }
}
