//! OAuth 2.0 client-credentials grant (service principal with a secret).

use async_trait::async_trait;

use crate::error::{AuthError, Result};
use crate::provider::{AccessToken, AccessTokenProvider, Authority, parse_token_response};

/// Configuration for a confidential client.
#[derive(Clone)]
pub struct ClientSecretConfig {
    /// Authority host, e.g. [`DEFAULT_AUTHORITY`](crate::DEFAULT_AUTHORITY).
    pub authority: String,
    /// Entra ID tenant id.
    pub tenant_id: String,
    /// Application (client) id of the service principal.
    pub client_id: String,
    /// Client secret of the service principal.
    pub client_secret: String,
}

impl std::fmt::Debug for ClientSecretConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretConfig")
            .field("authority", &self.authority)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Unattended token source using the client-credentials grant.
pub struct ClientSecretCredential {
    authority: Authority,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

impl ClientSecretCredential {
    /// Create a credential from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the client id or secret is
    /// empty, or the authority cannot be parsed.
    pub fn new(config: ClientSecretConfig) -> Result<Self> {
        if config.client_id.trim().is_empty() {
            return Err(AuthError::InvalidConfig {
                reason: "client_id must not be empty".to_string(),
            });
        }
        if config.client_secret.is_empty() {
            return Err(AuthError::InvalidConfig {
                reason: "client_secret must not be empty".to_string(),
            });
        }

        Ok(Self {
            authority: Authority::new(&config.authority, &config.tenant_id)?,
            client_id: config.client_id,
            client_secret: config.client_secret,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl AccessTokenProvider for ClientSecretCredential {
    fn flow_name(&self) -> &'static str {
        "client_secret"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let token_url = self.authority.token_url()?;
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        tracing::debug!(%token_url, scope, "requesting client-credentials token");

        let response = self.client.post(token_url).form(&params).send().await?;
        let token = parse_token_response(response).await?;
        Ok(token.access_token())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClientSecretConfig {
        ClientSecretConfig {
            authority: crate::DEFAULT_AUTHORITY.to_string(),
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "s3cr3t".to_string(),
        }
    }

    #[test]
    fn new_accepts_valid_config() {
        let credential = ClientSecretCredential::new(test_config()).unwrap();
        assert_eq!(credential.flow_name(), "client_secret");
    }

    #[test]
    fn new_rejects_empty_secret() {
        let mut config = test_config();
        config.client_secret.clear();
        assert!(matches!(
            ClientSecretCredential::new(config),
            Err(AuthError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn new_rejects_empty_client_id() {
        let mut config = test_config();
        config.client_id = " ".to_string();
        assert!(ClientSecretCredential::new(config).is_err());
    }

    #[test]
    fn config_debug_hides_secret() {
        let debug = format!("{:?}", test_config());
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("client-1"));
    }

    #[test]
    fn credential_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientSecretCredential>();
    }
}
