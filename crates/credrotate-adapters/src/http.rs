//! Shared HTTP plumbing: bearer token caching and response checking.

use std::sync::Arc;

use credrotate_auth::{AccessToken, AccessTokenProvider};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AdapterError, Result};

/// User agent sent on every request.
pub(crate) const USER_AGENT: &str = concat!("credrotate/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used by the adapters.
pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Bearer tokens
// ---------------------------------------------------------------------------

/// A token provider pinned to one scope, reusing the token until it is
/// about to expire.
pub(crate) struct ScopedBearer {
    provider: Arc<dyn AccessTokenProvider>,
    scope: &'static str,
    cached: Mutex<Option<AccessToken>>,
}

impl ScopedBearer {
    pub(crate) fn new(provider: Arc<dyn AccessTokenProvider>, scope: &'static str) -> Self {
        Self {
            provider,
            scope,
            cached: Mutex::new(None),
        }
    }

    /// `Authorization` header value for the next request.
    pub(crate) async fn header(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && !token.is_expired()
        {
            return Ok(token.bearer_header());
        }

        let token = self.provider.get_token(self.scope).await?;
        debug!(
            flow = self.provider.flow_name(),
            scope = self.scope,
            "acquired bearer token"
        );
        let header = token.bearer_header();
        *cached = Some(token);
        Ok(header)
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Fail with [`AdapterError::Upstream`] unless the response is a success,
/// returning the body text otherwise.
pub(crate) async fn success_body(
    service: &'static str,
    response: reqwest::Response,
) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(AdapterError::Upstream {
            service,
            status: status.as_u16(),
            body: error_message(&body),
        });
    }
    Ok(body)
}

/// Check the status and parse the body as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T> {
    let body = success_body(service, response).await?;
    Ok(serde_json::from_str(&body)?)
}

/// Pull the human-readable message out of a Power BI
/// (`{"error":{"code","message"}}`) or Databricks
/// (`{"error_code","message"}`) error body.
fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    let nested = json.get("error");
    let message = nested
        .and_then(|e| e.get("message"))
        .or_else(|| nested.and_then(|e| e.get("code")))
        .or_else(|| json.get("message"))
        .and_then(Value::as_str);

    match (message, json.get("error_code").and_then(Value::as_str)) {
        (Some(message), Some(code)) => format!("{code}: {message}"),
        (Some(message), None) => message.to_string(),
        (None, _) => body.to_string(),
    }
}
