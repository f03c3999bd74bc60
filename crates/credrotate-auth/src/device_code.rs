//! RFC 8628 Device Authorization Grant against Entra ID.
//!
//! Used when the rotation job runs on behalf of a person instead of a
//! service principal.  The user is shown a short code to enter in a browser;
//! the job polls the token endpoint until sign-in completes.
//!
//! # Flow Overview
//!
//! 1. Request a device code for the scope (plus `offline_access`).
//! 2. Show the `user_code` and `verification_uri` to the user.
//! 3. Poll the token endpoint until the user completes sign-in.
//! 4. Keep the refresh token in memory so later scopes in the same run are
//!    redeemed without a second prompt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{AuthError, Result};
use crate::provider::{
    AccessToken, AccessTokenProvider, Authority, TokenErrorResponse, TokenResponse,
    parse_token_response,
};

/// Public client id of the Azure CLI, the default for interactive sign-in.
pub const DEFAULT_PUBLIC_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a device-code sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeConfig {
    /// Authority host, e.g. [`DEFAULT_AUTHORITY`](crate::DEFAULT_AUTHORITY).
    pub authority: String,

    /// Entra ID tenant id, or `organizations`.
    pub tenant_id: String,

    /// Public client id that is allowed to use the device flow.
    pub client_id: String,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Response from the device authorization endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    /// The device verification code.
    pub device_code: String,

    /// The end-user verification code to display to the user.
    pub user_code: String,

    /// The URI the user should visit to enter the code.
    pub verification_uri: String,

    /// Human-readable instructions supplied by the server.
    pub message: Option<String>,

    /// Lifetime of the device_code and user_code in seconds.
    pub expires_in: u64,

    /// The minimum polling interval in seconds.
    pub interval: u64,
}

/// Raw device authorization response from the server.
///
/// Some servers use `verification_url` instead of `verification_uri`.
#[derive(Debug, Deserialize)]
struct RawDeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: Option<String>,
    verification_url: Option<String>,
    message: Option<String>,
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
}

fn default_interval() -> u64 {
    5
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Interactive token source using the device authorization grant.
pub struct DeviceCodeCredential {
    authority: Authority,
    client_id: String,
    client: reqwest::Client,
    refresh_token: Mutex<Option<String>>,
}

impl DeviceCodeCredential {
    /// Create a credential from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the client id is empty or the
    /// authority cannot be parsed.
    pub fn new(config: DeviceCodeConfig) -> Result<Self> {
        if config.client_id.trim().is_empty() {
            return Err(AuthError::InvalidConfig {
                reason: "client_id must not be empty".to_string(),
            });
        }
        Ok(Self {
            authority: Authority::new(&config.authority, &config.tenant_id)?,
            client_id: config.client_id,
            client: reqwest::Client::new(),
            refresh_token: Mutex::new(None),
        })
    }

    /// Request a device code for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Network`] on transport failure, or
    /// [`AuthError::FlowFailed`] if the server returns an error.
    pub async fn request_device_code(&self, scope: &str) -> Result<DeviceCodeResponse> {
        let device_code_url = self.authority.device_code_url()?;
        let scope_with_refresh = format!("{scope} offline_access");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("scope", scope_with_refresh.as_str()),
        ];

        tracing::debug!(%device_code_url, "requesting device code");

        let response = self
            .client
            .post(device_code_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::FlowFailed {
                reason: format!("device code request failed: HTTP {status}: {body}"),
            });
        }

        let raw: RawDeviceCodeResponse = response.json().await?;

        let verification_uri = raw
            .verification_uri
            .or(raw.verification_url)
            .ok_or_else(|| AuthError::FlowFailed {
                reason: "device code response missing verification_uri".to_string(),
            })?;

        Ok(DeviceCodeResponse {
            device_code: raw.device_code,
            user_code: raw.user_code,
            verification_uri,
            message: raw.message,
            expires_in: raw.expires_in,
            interval: raw.interval,
        })
    }

    /// Poll the token endpoint until the user completes sign-in.
    ///
    /// Polls every `interval` seconds (increasing on `slow_down` responses)
    /// and gives up after `timeout` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::FlowFailed`] if the user declines or the code
    /// expires, or [`AuthError::Timeout`] if `timeout` seconds elapse.
    pub(crate) async fn poll_for_token(
        &self,
        device_code: &str,
        interval: u64,
        timeout: u64,
    ) -> Result<TokenResponse> {
        let token_url = self.authority.token_url()?;
        let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(timeout);
        let mut current_interval = interval;

        tracing::debug!(
            interval = current_interval,
            timeout = timeout,
            "polling for device code token"
        );

        loop {
            // Sleep before polling (first poll also waits).
            tokio::time::sleep(tokio::time::Duration::from_secs(current_interval)).await;

            if tokio::time::Instant::now() >= deadline {
                return Err(AuthError::Timeout {
                    timeout_secs: timeout,
                });
            }

            let params = [
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("device_code", device_code),
                ("client_id", self.client_id.as_str()),
            ];

            let response = self
                .client
                .post(token_url.clone())
                .form(&params)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                tracing::info!("device code sign-in completed");
                return Ok(response.json().await?);
            }

            let body = response.text().await.unwrap_or_default();
            let poll_error = serde_json::from_str::<TokenErrorResponse>(&body).map_err(|_| {
                AuthError::FlowFailed {
                    reason: format!("unexpected token response: HTTP {status}: {body}"),
                }
            })?;

            match poll_error.error.as_str() {
                "authorization_pending" => {
                    tracing::trace!("authorization pending, will retry");
                }
                "slow_down" => {
                    // RFC 8628 section 3.5.
                    current_interval += 5;
                    tracing::debug!(
                        new_interval = current_interval,
                        "slow_down received, increasing poll interval"
                    );
                }
                "authorization_declined" | "access_denied" => {
                    return Err(AuthError::FlowFailed {
                        reason: "user declined authorization".to_string(),
                    });
                }
                "expired_token" => {
                    return Err(AuthError::FlowFailed {
                        reason: "device code expired before sign-in completed".to_string(),
                    });
                }
                other => {
                    return Err(AuthError::FlowFailed {
                        reason: format!("device code poll error: {other}"),
                    });
                }
            }
        }
    }

    /// Redeem a refresh token for another scope.
    async fn redeem_refresh_token(
        &self,
        refresh_token: &str,
        scope: &str,
    ) -> Result<TokenResponse> {
        let token_url = self.authority.token_url()?;
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("scope", scope),
        ];

        tracing::debug!(scope, "redeeming refresh token");

        let response = self.client.post(token_url).form(&params).send().await?;
        parse_token_response(response).await
    }

    async fn sign_in(&self, scope: &str) -> Result<TokenResponse> {
        let code = self.request_device_code(scope).await?;

        let prompt = code.message.clone().unwrap_or_else(|| {
            format!(
                "To sign in, open {} and enter the code {}",
                code.verification_uri, code.user_code
            )
        });
        tracing::info!(verification_uri = %code.verification_uri, "waiting for device code sign-in");
        eprintln!("{prompt}");

        self.poll_for_token(&code.device_code, code.interval, code.expires_in)
            .await
    }
}

#[async_trait]
impl AccessTokenProvider for DeviceCodeCredential {
    fn flow_name(&self) -> &'static str {
        "device_code"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut refresh_token = self.refresh_token.lock().await;

        let response = match refresh_token.as_deref() {
            Some(existing) => match self.redeem_refresh_token(existing, scope).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(error = %err, "refresh token rejected, signing in again");
                    self.sign_in(scope).await?
                }
            },
            None => self.sign_in(scope).await?,
        };

        if let Some(rotated) = response.refresh_token.clone() {
            *refresh_token = Some(rotated);
        }
        Ok(response.access_token())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_code_response_parsing() {
        let json = r#"{
            "user_code": "FQK5HW3UF",
            "device_code": "DAQABAAEAAAD",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 5,
            "message": "To sign in, use a web browser to open the page https://microsoft.com/devicelogin and enter the code FQK5HW3UF to authenticate."
        }"#;

        let raw: RawDeviceCodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(raw.device_code, "DAQABAAEAAAD");
        assert_eq!(raw.user_code, "FQK5HW3UF");
        assert_eq!(
            raw.verification_uri.as_deref(),
            Some("https://microsoft.com/devicelogin")
        );
        assert!(raw.message.unwrap().contains("FQK5HW3UF"));
        assert_eq!(raw.expires_in, 900);
        assert_eq!(raw.interval, 5);
    }

    #[test]
    fn device_code_response_with_verification_url() {
        let json = r#"{
            "device_code": "dev_xyz",
            "user_code": "WXYZ",
            "verification_url": "https://microsoft.com/devicelogin",
            "expires_in": 600,
            "interval": 10
        }"#;

        let raw: RawDeviceCodeResponse = serde_json::from_str(json).unwrap();
        assert!(raw.verification_uri.is_none());
        assert_eq!(
            raw.verification_url.as_deref(),
            Some("https://microsoft.com/devicelogin")
        );
    }

    #[test]
    fn device_code_response_default_interval() {
        let json = r#"{
            "device_code": "dev_abc",
            "user_code": "TEST",
            "verification_uri": "https://example.com/device",
            "expires_in": 300
        }"#;

        let raw: RawDeviceCodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(raw.interval, 5);
    }

    #[test]
    fn poll_error_slow_down() {
        let json = r#"{ "error": "slow_down" }"#;
        let err: TokenErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(err.error, "slow_down");
    }

    #[test]
    fn new_rejects_empty_client_id() {
        let config = DeviceCodeConfig {
            authority: crate::DEFAULT_AUTHORITY.to_string(),
            tenant_id: "organizations".to_string(),
            client_id: String::new(),
        };
        assert!(matches!(
            DeviceCodeCredential::new(config),
            Err(AuthError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn device_code_credential_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DeviceCodeCredential>();
        assert_send_sync::<DeviceCodeConfig>();
        assert_send_sync::<DeviceCodeResponse>();
    }
}
