//! The rotation job.
//!
//! Mints a fresh warehouse token and installs it wherever Power BI needs
//! it:
//!
//! 1. gateway datasource: look up gateway and datasource by name, encrypt
//!    the key credential under the gateway's public key, PATCH it;
//! 2. dataset: take the dataset over, find its bound datasource, PATCH the
//!    key credential in the clear;
//! 3. optionally revoke every other token of the principal.
//!
//! Each step fails fast; nothing is retried.  A failure after the token
//! is minted names that token's id so the caller can revoke it.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use credrotate_adapters::{
    CredentialDetails, ReportingService, TokenLifecycle, WarehouseToken,
};
use credrotate_crypto::{CredentialPlaintext, OaepHash, RecipientKey, encode_credentials};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{DatasetTarget, GatewayTarget, RotationConfig};

/// Where a credential was installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatedDatasource {
    pub gateway_id: String,
    pub datasource_id: String,
}

/// Outcome of [`RotationJob::run`].
#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    /// Id of the freshly minted token (never the token itself).
    pub token_id: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub gateway: Option<UpdatedDatasource>,
    pub dataset: Option<UpdatedDatasource>,
    pub revoked: Vec<String>,
}

pub struct RotationJob {
    reporting: Arc<dyn ReportingService>,
    tokens: Arc<dyn TokenLifecycle>,
    oaep_hash: OaepHash,
}

impl RotationJob {
    pub fn new(
        reporting: Arc<dyn ReportingService>,
        tokens: Arc<dyn TokenLifecycle>,
        oaep_hash: OaepHash,
    ) -> Self {
        Self {
            reporting,
            tokens,
            oaep_hash,
        }
    }

    /// Install `pat` on an on-premises gateway datasource.  Issues exactly
    /// one credential update.
    pub async fn rotate_gateway_datasource(
        &self,
        target: &GatewayTarget,
        pat: &str,
    ) -> Result<UpdatedDatasource> {
        let gateway_id = self
            .reporting
            .get_gateway_id(&target.name)
            .await
            .with_context(|| format!("failed to look up gateway `{}`", target.name))?;

        let published = self
            .reporting
            .get_gateway_public_key(&gateway_id)
            .await
            .context("failed to fetch gateway public key")?;
        let recipient =
            RecipientKey::from_gateway(&published).context("gateway public key is unusable")?;

        let datasource_id = self
            .reporting
            .get_gateway_datasource_id(&gateway_id, &target.datasource_name)
            .await
            .with_context(|| {
                format!(
                    "failed to look up datasource `{}` on gateway `{}`",
                    target.datasource_name, target.name
                )
            })?;

        let plaintext = CredentialPlaintext::key(pat);
        let blob = encode_credentials(&recipient, plaintext.as_str(), self.oaep_hash)
            .context("failed to encrypt credentials")?;

        self.reporting
            .patch_datasource_credential(
                &gateway_id,
                &datasource_id,
                &CredentialDetails::encrypted_key(&blob),
            )
            .await
            .context("failed to update gateway datasource credentials")?;

        info!(
            gateway = %target.name,
            %gateway_id,
            %datasource_id,
            key_bits = recipient.modulus_bits(),
            oaep_hash = %self.oaep_hash,
            "gateway datasource rotated"
        );
        Ok(UpdatedDatasource {
            gateway_id,
            datasource_id,
        })
    }

    /// Install `pat` on the cloud datasource bound to a dataset.
    pub async fn rotate_dataset(
        &self,
        target: &DatasetTarget,
        pat: &str,
    ) -> Result<UpdatedDatasource> {
        self.reporting
            .take_over_dataset(&target.workspace_id, &target.dataset_id)
            .await
            .with_context(|| format!("failed to take over dataset `{}`", target.dataset_id))?;

        let datasources = self
            .reporting
            .get_dataset_datasources(&target.workspace_id, &target.dataset_id)
            .await
            .context("failed to list dataset datasources")?;

        if datasources.len() > 1 {
            warn!(
                dataset_id = %target.dataset_id,
                count = datasources.len(),
                "dataset has several datasources, updating the first"
            );
        }
        let first = datasources
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("dataset `{}` has no datasources", target.dataset_id))?;

        let (Some(gateway_id), Some(datasource_id)) = (first.gateway_id, first.datasource_id)
        else {
            return Err(anyhow!(
                "dataset `{}` datasource is missing its gatewayId or datasourceId",
                target.dataset_id
            ));
        };

        let plaintext = CredentialPlaintext::key(pat);
        self.reporting
            .patch_datasource_credential(
                &gateway_id,
                &datasource_id,
                &CredentialDetails::plain_key(&plaintext),
            )
            .await
            .context("failed to update dataset datasource credentials")?;

        info!(
            dataset_id = %target.dataset_id,
            %gateway_id,
            %datasource_id,
            "dataset datasource rotated"
        );
        Ok(UpdatedDatasource {
            gateway_id,
            datasource_id,
        })
    }

    /// Revoke every listed token except `keep`.  Each id is deleted once
    /// even if the listing repeats it.  Returns the revoked ids in listing
    /// order.
    pub async fn revoke_tokens(&self, keep: Option<&str>) -> Result<Vec<String>> {
        let listed = self
            .tokens
            .list_tokens()
            .await
            .context("failed to list warehouse tokens")?;

        let mut seen = HashSet::new();
        let mut revoked = Vec::new();
        for info in listed {
            if keep == Some(info.token_id.as_str()) || !seen.insert(info.token_id.clone()) {
                continue;
            }
            self.tokens
                .delete_token(&info.token_id)
                .await
                .with_context(|| format!("failed to revoke token `{}`", info.token_id))?;
            revoked.push(info.token_id);
        }

        info!(count = revoked.len(), "warehouse tokens revoked");
        Ok(revoked)
    }

    /// Mint a token and install it on every configured target.
    pub async fn run(&self, config: &RotationConfig) -> Result<RotationReport> {
        let warehouse = &config.warehouse;
        let token = self
            .tokens
            .create_token(warehouse.token_lifetime_secs, &warehouse.token_comment)
            .await
            .context("failed to create warehouse token")?;

        let (gateway, dataset, revoked) = match self.install(config, &token).await {
            Ok(installed) => installed,
            Err(err) => {
                warn!(
                    token_id = %token.info.token_id,
                    "rotation failed after the new token was created"
                );
                return Err(err.context(format!(
                    "warehouse token `{}` was created but not fully installed; \
                     revoke it or retry",
                    token.info.token_id
                )));
            }
        };

        Ok(RotationReport {
            token_expires_at: token.info.expires_at(),
            token_id: token.info.token_id,
            gateway,
            dataset,
            revoked,
        })
    }

    /// Everything `run` does after the token exists.
    async fn install(
        &self,
        config: &RotationConfig,
        token: &WarehouseToken,
    ) -> Result<(
        Option<UpdatedDatasource>,
        Option<UpdatedDatasource>,
        Vec<String>,
    )> {
        let gateway = match &config.gateway {
            Some(target) => Some(self.rotate_gateway_datasource(target, &token.value).await?),
            None => None,
        };
        let dataset = match &config.dataset {
            Some(target) => Some(self.rotate_dataset(target, &token.value).await?),
            None => None,
        };

        let revoked = if config.warehouse.revoke_previous {
            self.revoke_tokens(Some(&token.info.token_id)).await?
        } else {
            Vec::new()
        };
        Ok((gateway, dataset, revoked))
    }
}
