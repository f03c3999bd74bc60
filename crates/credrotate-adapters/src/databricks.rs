//! Databricks token API adapter.
//!
//! Mints, lists and revokes personal access tokens for the calling
//! principal.  Authenticates with an Entra ID token for the Azure Databricks
//! scope, so the same service principal that talks to Power BI can be used.

use std::sync::Arc;

use async_trait::async_trait;
use credrotate_auth::{AZURE_DATABRICKS_SCOPE, AccessTokenProvider};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::http::{ScopedBearer, build_client, read_json, success_body};
use crate::models::{TokenInfo, WarehouseToken};
use crate::traits::TokenLifecycle;

const SERVICE: &str = "databricks";

#[derive(Debug, Serialize)]
struct CreateTokenRequest<'a> {
    lifetime_seconds: u64,
    comment: &'a str,
}

#[derive(Deserialize)]
struct CreateTokenResponse {
    token_value: String,
    token_info: TokenInfo,
}

#[derive(Debug, Deserialize)]
struct ListTokensResponse {
    #[serde(default)]
    token_infos: Vec<TokenInfo>,
}

#[derive(Debug, Serialize)]
struct DeleteTokenRequest<'a> {
    token_id: &'a str,
}

/// Client for `/api/2.0/token/*` on one workspace.
pub struct DatabricksTokenClient {
    /// `https://{host}` without a trailing slash.
    base_url: String,
    bearer: ScopedBearer,
    client: reqwest::Client,
}

impl DatabricksTokenClient {
    /// Create a client for a workspace host such as
    /// `adb-123.azuredatabricks.net`.  A full `http(s)://` URL is also
    /// accepted.
    pub fn new(credential: Arc<dyn AccessTokenProvider>, host: &str) -> Self {
        let host = host.trim().trim_end_matches('/');
        let base_url = if host.starts_with("https://") || host.starts_with("http://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };

        Self {
            base_url,
            bearer: ScopedBearer::new(credential, AZURE_DATABRICKS_SCOPE),
            client: build_client(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/2.0/token/{}", self.base_url, path)
    }
}

#[async_trait]
impl TokenLifecycle for DatabricksTokenClient {
    async fn create_token(&self, lifetime_seconds: u64, comment: &str) -> Result<WarehouseToken> {
        let url = self.api_url("create");
        debug!(%url, lifetime_seconds, "creating warehouse token");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer.header().await?)
            .json(&CreateTokenRequest {
                lifetime_seconds,
                comment,
            })
            .send()
            .await?;
        let created: CreateTokenResponse = read_json(SERVICE, response).await?;

        info!(token_id = %created.token_info.token_id, "warehouse token created");
        Ok(WarehouseToken {
            value: created.token_value,
            info: created.token_info,
        })
    }

    async fn list_tokens(&self) -> Result<Vec<TokenInfo>> {
        let url = self.api_url("list");
        debug!(%url, "listing warehouse tokens");

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer.header().await?)
            .send()
            .await?;
        let list: ListTokensResponse = read_json(SERVICE, response).await?;
        Ok(list.token_infos)
    }

    async fn delete_token(&self, token_id: &str) -> Result<()> {
        let url = self.api_url("delete");
        debug!(%url, token_id, "deleting warehouse token");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer.header().await?)
            .json(&DeleteTokenRequest { token_id })
            .send()
            .await?;
        success_body(SERVICE, response).await?;

        info!(token_id, "warehouse token revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credrotate_auth::{AccessToken, AuthError};

    struct NoToken;

    #[async_trait]
    impl AccessTokenProvider for NoToken {
        fn flow_name(&self) -> &'static str {
            "none"
        }

        async fn get_token(&self, _scope: &str) -> credrotate_auth::Result<AccessToken> {
            Err(AuthError::InvalidConfig {
                reason: "no credential".to_string(),
            })
        }
    }

    #[test]
    fn bare_host_gets_https() {
        let client = DatabricksTokenClient::new(Arc::new(NoToken), "adb-123.azuredatabricks.net/");
        assert_eq!(
            client.api_url("create"),
            "https://adb-123.azuredatabricks.net/api/2.0/token/create"
        );
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let client = DatabricksTokenClient::new(Arc::new(NoToken), "http://127.0.0.1:8080");
        assert_eq!(client.api_url("list"), "http://127.0.0.1:8080/api/2.0/token/list");
    }

    #[test]
    fn create_response_parsing() {
        let json = r#"{
            "token_value": "dapi0123456789abcdef",
            "token_info": {
                "token_id": "5715498424f15ee0213be729257b53fc35a47d5953e3bdfd8ed22a0b93b339f4",
                "creation_time": 1626286601651,
                "expiry_time": 1626373001651,
                "comment": "PowerBI access"
            }
        }"#;
        let created: CreateTokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(created.token_value, "dapi0123456789abcdef");
        assert_eq!(created.token_info.comment.as_deref(), Some("PowerBI access"));
        assert!(created.token_info.expires_at().is_some());
    }

    #[test]
    fn empty_list_response_parsing() {
        let list: ListTokensResponse = serde_json::from_str("{}").unwrap();
        assert!(list.token_infos.is_empty());
    }

    #[test]
    fn create_request_shape() {
        let body = serde_json::to_value(CreateTokenRequest {
            lifetime_seconds: 86400,
            comment: "PowerBI access",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "lifetime_seconds": 86400, "comment": "PowerBI access" })
        );
    }
}
