//! Power BI REST API adapter.
//!
//! Covers the gateway and dataset calls needed to swap a datasource's
//! credentials: gateway and datasource lookup by name, the gateway public
//! key, dataset take-over and the credential update itself.

use std::sync::Arc;

use async_trait::async_trait;
use credrotate_auth::{AccessTokenProvider, POWER_BI_SCOPE};
use credrotate_crypto::GatewayPublicKey;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{AdapterError, Result};
use crate::http::{ScopedBearer, build_client, read_json, success_body};
use crate::models::{
    CredentialDetails, DatasetDatasource, Gateway, GatewayDatasource, ODataList,
    UpdateDatasourceRequest,
};
use crate::traits::ReportingService;

/// Default Power BI API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.powerbi.com/v1.0/myorg";

const SERVICE: &str = "powerbi";

/// Power BI REST API client.
pub struct PowerBiClient {
    /// Base URL without a trailing slash.
    base_url: String,
    bearer: ScopedBearer,
    client: reqwest::Client,
}

impl PowerBiClient {
    /// Create a client against the public Power BI service.
    pub fn new(credential: Arc<dyn AccessTokenProvider>) -> Self {
        Self::with_base_url(credential, DEFAULT_API_BASE)
    }

    /// Create a client against another base URL (sovereign clouds, tests).
    pub fn with_base_url(credential: Arc<dyn AccessTokenProvider>, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer: ScopedBearer::new(credential, POWER_BI_SCOPE),
            client: build_client(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.api_url(path);
        debug!(%url, "GET");
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer.header().await?)
            .send()
            .await?;
        read_json(SERVICE, response).await
    }

    /// List the gateways the caller can administer.
    pub async fn list_gateways(&self) -> Result<Vec<Gateway>> {
        let list: ODataList<Gateway> = self.get_json("/gateways").await?;
        Ok(list.value)
    }

    /// List the datasources registered on a gateway.
    pub async fn list_gateway_datasources(
        &self,
        gateway_id: &str,
    ) -> Result<Vec<GatewayDatasource>> {
        let list: ODataList<GatewayDatasource> = self
            .get_json(&format!("/gateways/{gateway_id}/datasources"))
            .await?;
        Ok(list.value)
    }
}

#[async_trait]
impl ReportingService for PowerBiClient {
    async fn get_gateway_id(&self, gateway_name: &str) -> Result<String> {
        let gateways = self.list_gateways().await?;
        let mut matches = gateways.into_iter().filter(|g| g.name == gateway_name);

        let gateway = matches.next().ok_or_else(|| AdapterError::NotFound {
            kind: "gateway",
            name: gateway_name.to_string(),
        })?;
        if matches.next().is_some() {
            warn!(
                gateway = gateway_name,
                chosen = %gateway.id,
                "several gateways share this name, using the first"
            );
        }

        debug!(gateway = gateway_name, id = %gateway.id, "resolved gateway");
        Ok(gateway.id)
    }

    async fn get_gateway_public_key(&self, gateway_id: &str) -> Result<GatewayPublicKey> {
        let gateway: Gateway = self.get_json(&format!("/gateways/{gateway_id}")).await?;
        gateway
            .public_key
            .ok_or_else(|| AdapterError::UnexpectedResponse {
                reason: format!("gateway `{gateway_id}` has no publicKey"),
            })
    }

    async fn get_gateway_datasource_id(
        &self,
        gateway_id: &str,
        datasource_name: &str,
    ) -> Result<String> {
        let datasources = self.list_gateway_datasources(gateway_id).await?;
        let mut matches = datasources
            .into_iter()
            .filter(|d| d.datasource_name == datasource_name);

        let datasource = matches.next().ok_or_else(|| AdapterError::NotFound {
            kind: "gateway datasource",
            name: datasource_name.to_string(),
        })?;
        if matches.next().is_some() {
            warn!(
                datasource = datasource_name,
                chosen = %datasource.id,
                "several datasources share this name, using the first"
            );
        }

        debug!(datasource = datasource_name, id = %datasource.id, "resolved datasource");
        Ok(datasource.id)
    }

    async fn patch_datasource_credential(
        &self,
        gateway_id: &str,
        datasource_id: &str,
        details: &CredentialDetails,
    ) -> Result<()> {
        let url = self.api_url(&format!(
            "/gateways/{gateway_id}/datasources/{datasource_id}"
        ));
        debug!(%url, algorithm = %details.encryption_algorithm, "PATCH");

        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.bearer.header().await?)
            .json(&UpdateDatasourceRequest {
                credential_details: details,
            })
            .send()
            .await?;
        success_body(SERVICE, response).await?;

        info!(gateway_id, datasource_id, "datasource credentials updated");
        Ok(())
    }

    async fn take_over_dataset(&self, workspace_id: &str, dataset_id: &str) -> Result<()> {
        let url = self.api_url(&format!(
            "/groups/{workspace_id}/datasets/{dataset_id}/Default.TakeOver"
        ));
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer.header().await?)
            .header("Content-Length", "0")
            .send()
            .await?;
        success_body(SERVICE, response).await?;

        info!(workspace_id, dataset_id, "took over dataset");
        Ok(())
    }

    async fn get_dataset_datasources(
        &self,
        workspace_id: &str,
        dataset_id: &str,
    ) -> Result<Vec<DatasetDatasource>> {
        let list: ODataList<DatasetDatasource> = self
            .get_json(&format!(
                "/groups/{workspace_id}/datasets/{dataset_id}/datasources"
            ))
            .await?;
        Ok(list.value)
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
    fn base_url_trailing_slash_is_trimmed() {
        let client = PowerBiClient::with_base_url(Arc::new(NoToken), "http://localhost:1/v1.0/myorg/");
        assert_eq!(
            client.api_url("/gateways"),
            "http://localhost:1/v1.0/myorg/gateways"
        );
    }

    #[test]
    fn default_base_url() {
        let client = PowerBiClient::new(Arc::new(NoToken));
        assert_eq!(
            client.api_url("/gateways"),
            "https://api.powerbi.com/v1.0/myorg/gateways"
        );
    }

    #[tokio::test]
    async fn token_failure_surfaces_as_auth_error() {
        let client = PowerBiClient::with_base_url(Arc::new(NoToken), "http://127.0.0.1:9");
        let err = client.get_gateway_id("SalesGateway").await.unwrap_err();
        assert!(matches!(err, AdapterError::Auth(_)));
    }
}
