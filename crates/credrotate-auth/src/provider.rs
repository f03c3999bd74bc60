//! The access-token capability and the token endpoint plumbing shared by
//! both flows.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::{AuthError, Result};

/// Default Entra ID authority host.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Scope for the Power BI REST API.
pub const POWER_BI_SCOPE: &str = "https://analysis.windows.net/powerbi/api/.default";

/// Scope for Azure Databricks (the first-party application id).
pub const AZURE_DATABRICKS_SCOPE: &str = "2ff814a6-3304-4ab8-85cb-cd0e6f879c1d/.default";

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A bearer token for one scope.
#[derive(Clone)]
pub struct AccessToken {
    /// The raw bearer token.
    pub token: String,
    /// Unix timestamp (seconds) when the token expires, if the server said.
    pub expires_at: Option<i64>,
}

impl AccessToken {
    /// Whether the token is expired or will be within the next 60 seconds.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => chrono::Utc::now().timestamp() >= expires_at - 60,
            None => false,
        }
    }

    /// Value for an `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Something that can hand out bearer tokens for a scope.
///
/// Implemented by [`ClientSecretCredential`](crate::ClientSecretCredential)
/// for unattended jobs and
/// [`DeviceCodeCredential`](crate::DeviceCodeCredential) for interactive
/// sign-in.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Short name of the flow, for logs.
    fn flow_name(&self) -> &'static str;

    /// Obtain a bearer token for `scope` (e.g. [`POWER_BI_SCOPE`]).
    async fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

/// An Entra ID tenant endpoint set.
#[derive(Debug, Clone)]
pub struct Authority {
    base: Url,
    tenant_id: String,
}

impl Authority {
    /// Build an authority from a host URL and a tenant id (or `organizations`).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] for an empty tenant id and
    /// [`AuthError::UrlParse`] for an invalid host URL.
    pub fn new(authority_url: &str, tenant_id: &str) -> Result<Self> {
        if tenant_id.trim().is_empty() {
            return Err(AuthError::InvalidConfig {
                reason: "tenant_id must not be empty".to_string(),
            });
        }
        let mut base = Url::parse(authority_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            tenant_id: tenant_id.trim().to_string(),
        })
    }

    /// `{authority}/{tenant}/oauth2/v2.0/token`
    pub fn token_url(&self) -> Result<Url> {
        Ok(self
            .base
            .join(&format!("{}/oauth2/v2.0/token", self.tenant_id))?)
    }

    /// `{authority}/{tenant}/oauth2/v2.0/devicecode`
    pub fn device_code_url(&self) -> Result<Url> {
        Ok(self
            .base
            .join(&format!("{}/oauth2/v2.0/devicecode", self.tenant_id))?)
    }
}

// ---------------------------------------------------------------------------
// Token endpoint responses
// ---------------------------------------------------------------------------

/// Raw token response from the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
    pub(crate) expires_in: Option<i64>,
}

impl TokenResponse {
    pub(crate) fn access_token(&self) -> AccessToken {
        AccessToken {
            token: self.access_token.clone(),
            expires_at: self
                .expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs),
        }
    }
}

/// Raw error response from the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub(crate) error: String,
    pub(crate) error_description: Option<String>,
}

/// Parse a token endpoint response, mapping OAuth errors to
/// [`AuthError::InvalidGrant`].
pub(crate) async fn parse_token_response(response: reqwest::Response) -> Result<TokenResponse> {
    let status = response.status();

    if status.is_success() {
        let token: TokenResponse = response.json().await?;
        tracing::debug!("token request successful");
        return Ok(token);
    }

    let body = response.text().await.unwrap_or_default();
    let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
        Ok(err) => err.error_description.unwrap_or(err.error),
        Err(_) => format!("HTTP {status}: {body}"),
    };
    Err(AuthError::InvalidGrant { reason })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
