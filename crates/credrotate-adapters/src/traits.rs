//! The two service capabilities the rotation job is written against.
//!
//! [`ReportingService`] is implemented by
//! [`PowerBiClient`](crate::PowerBiClient) and [`TokenLifecycle`] by
//! [`DatabricksTokenClient`](crate::DatabricksTokenClient).  Tests substitute
//! in-memory implementations.

use async_trait::async_trait;
use credrotate_crypto::GatewayPublicKey;

use crate::error::Result;
use crate::models::{CredentialDetails, DatasetDatasource, TokenInfo, WarehouseToken};

// ---------------------------------------------------------------------------
// Reporting service (gateways and datasets)
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ReportingService: Send + Sync {
    /// Resolve a gateway id from its display name.
    async fn get_gateway_id(&self, gateway_name: &str) -> Result<String>;

    /// Fetch the gateway's current RSA public key.
    async fn get_gateway_public_key(&self, gateway_id: &str) -> Result<GatewayPublicKey>;

    /// Resolve a datasource id on a gateway from its display name.
    async fn get_gateway_datasource_id(
        &self,
        gateway_id: &str,
        datasource_name: &str,
    ) -> Result<String>;

    /// Replace the credentials of a gateway datasource.
    async fn patch_datasource_credential(
        &self,
        gateway_id: &str,
        datasource_id: &str,
        details: &CredentialDetails,
    ) -> Result<()>;

    /// Make the caller the owner of a dataset, which is required before its
    /// datasource credentials can be changed.
    async fn take_over_dataset(&self, workspace_id: &str, dataset_id: &str) -> Result<()>;

    /// List the datasources bound to a dataset.
    async fn get_dataset_datasources(
        &self,
        workspace_id: &str,
        dataset_id: &str,
    ) -> Result<Vec<DatasetDatasource>>;
}

// ---------------------------------------------------------------------------
// Token lifecycle (warehouse personal access tokens)
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TokenLifecycle: Send + Sync {
    /// Mint a new personal access token.
    async fn create_token(&self, lifetime_seconds: u64, comment: &str) -> Result<WarehouseToken>;

    /// List the caller's tokens.
    async fn list_tokens(&self) -> Result<Vec<TokenInfo>>;

    /// Revoke one token.
    async fn delete_token(&self, token_id: &str) -> Result<()>;
}
