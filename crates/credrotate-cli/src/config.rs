//! Rotation configuration.
//!
//! Read from a TOML file (default `config/credrotate.toml`).  Identity
//! values can be overridden from the environment, which is also where the
//! client secret is expected to come from:
//!
//! | Variable | Overrides |
//! |---|---|
//! | `CREDROTATE_TENANT_ID` | `identity.tenant_id` |
//! | `CREDROTATE_CLIENT_ID` | `identity.client_id` |
//! | `CREDROTATE_CLIENT_SECRET` | `identity.client_secret` |

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use credrotate_adapters::DEFAULT_API_BASE;
use credrotate_auth::{
    AccessTokenProvider, ClientSecretConfig, ClientSecretCredential, DEFAULT_AUTHORITY,
    DEFAULT_PUBLIC_CLIENT_ID, DeviceCodeConfig, DeviceCodeCredential,
};
use credrotate_crypto::OaepHash;
use serde::Deserialize;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/credrotate.toml";

pub const ENV_TENANT_ID: &str = "CREDROTATE_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "CREDROTATE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "CREDROTATE_CLIENT_SECRET";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// How the job signs in to Entra ID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityFlow {
    /// Service principal with a client secret.
    #[default]
    ClientSecret,
    /// Interactive sign-in from a browser.
    DeviceCode,
}

/// `[identity]`
#[derive(Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub flow: IdentityFlow,
    #[serde(default = "default_authority")]
    pub authority: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            flow: IdentityFlow::default(),
            authority: default_authority(),
        }
    }
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("flow", &self.flow)
            .field("authority", &self.authority)
            .finish()
    }
}

/// `[warehouse]`
#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    /// Workspace host, e.g. `adb-123.azuredatabricks.net`.
    pub host: String,
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,
    #[serde(default = "default_token_comment")]
    pub token_comment: String,
    /// Revoke the principal's other tokens after a successful rotation.
    #[serde(default)]
    pub revoke_previous: bool,
}

/// `[powerbi]`
#[derive(Debug, Clone, Deserialize)]
pub struct PowerBiConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub oaep_hash: OaepHash,
}

impl Default for PowerBiConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            oaep_hash: OaepHash::default(),
        }
    }
}

/// `[gateway]`: an on-premises gateway datasource to update.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayTarget {
    pub name: String,
    pub datasource_name: String,
}

/// `[dataset]`: a dataset whose cloud datasource to update.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetTarget {
    pub workspace_id: String,
    pub dataset_id: String,
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

fn default_token_lifetime() -> u64 {
    86_400
}

fn default_token_comment() -> String {
    "PowerBI access".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

// ---------------------------------------------------------------------------
// Whole file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RotationConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub powerbi: PowerBiConfig,
    #[serde(default)]
    pub gateway: Option<GatewayTarget>,
    #[serde(default)]
    pub dataset: Option<DatasetTarget>,
}

impl RotationConfig {
    /// Read `path`, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay identity values from `lookup` (the process environment in
    /// production).  Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(tenant_id) = get(ENV_TENANT_ID) {
            self.identity.tenant_id = Some(tenant_id);
        }
        if let Some(client_id) = get(ENV_CLIENT_ID) {
            self.identity.client_id = Some(client_id);
        }
        if let Some(client_secret) = get(ENV_CLIENT_SECRET) {
            self.identity.client_secret = Some(client_secret);
        }
    }

    /// Check the settings every command needs.  `rotate` additionally
    /// needs at least one target, which `require_targets` enforces.
    pub fn validate(&self, require_targets: bool) -> Result<()> {
        ensure!(
            !self.warehouse.host.trim().is_empty(),
            "warehouse.host must not be empty"
        );
        ensure!(
            self.warehouse.token_lifetime_secs > 0,
            "warehouse.token_lifetime_secs must be greater than zero"
        );

        if self.identity.flow == IdentityFlow::ClientSecret {
            if is_blank(&self.identity.tenant_id) {
                bail!("identity.tenant_id is required (or set {ENV_TENANT_ID})");
            }
            if is_blank(&self.identity.client_id) {
                bail!("identity.client_id is required (or set {ENV_CLIENT_ID})");
            }
            if is_blank(&self.identity.client_secret) {
                bail!("the client_secret flow needs a secret: set {ENV_CLIENT_SECRET}");
            }
        }

        if require_targets && self.gateway.is_none() && self.dataset.is_none() {
            bail!("nothing to rotate: add a [gateway] and/or [dataset] section");
        }
        Ok(())
    }

    /// Build the token source for the configured flow.
    pub fn build_provider(&self) -> Result<Arc<dyn AccessTokenProvider>> {
        let identity = &self.identity;
        let provider: Arc<dyn AccessTokenProvider> = match identity.flow {
            IdentityFlow::ClientSecret => Arc::new(
                ClientSecretCredential::new(ClientSecretConfig {
                    authority: identity.authority.clone(),
                    tenant_id: identity.tenant_id.clone().unwrap_or_default(),
                    client_id: identity.client_id.clone().unwrap_or_default(),
                    client_secret: identity.client_secret.clone().unwrap_or_default(),
                })
                .context("invalid client-secret identity")?,
            ),
            IdentityFlow::DeviceCode => Arc::new(
                DeviceCodeCredential::new(DeviceCodeConfig {
                    authority: identity.authority.clone(),
                    tenant_id: identity
                        .tenant_id
                        .clone()
                        .unwrap_or_else(|| "organizations".to_string()),
                    client_id: identity
                        .client_id
                        .clone()
                        .unwrap_or_else(|| DEFAULT_PUBLIC_CLIENT_ID.to_string()),
                })
                .context("invalid device-code identity")?,
            ),
        };
        Ok(provider)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const FULL: &str = r#"
[identity]
tenant_id = "tenant-1"
client_id = "client-1"
flow = "client_secret"

[warehouse]
host = "adb-123.azuredatabricks.net"
token_lifetime_secs = 3600
revoke_previous = true

[powerbi]
oaep_hash = "sha1"

[gateway]
name = "SalesGateway"
datasource_name = "databricks-prod"

[dataset]
workspace_id = "ws-1"
dataset_id = "dataset-9"
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn parses_full_file() {
        let config = RotationConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.identity.tenant_id.as_deref(), Some("tenant-1"));
        assert_eq!(config.identity.flow, IdentityFlow::ClientSecret);
        assert_eq!(config.identity.authority, DEFAULT_AUTHORITY);
        assert_eq!(config.warehouse.token_lifetime_secs, 3600);
        assert_eq!(config.warehouse.token_comment, "PowerBI access");
        assert!(config.warehouse.revoke_previous);
        assert_eq!(config.powerbi.oaep_hash, OaepHash::Sha1);
        assert_eq!(config.powerbi.api_base, DEFAULT_API_BASE);
        assert_eq!(config.gateway.unwrap().name, "SalesGateway");
        assert_eq!(config.dataset.unwrap().dataset_id, "dataset-9");
    }

    #[test]
    fn minimal_file_gets_defaults() {
        let config = RotationConfig::from_toml_str(
            r#"
[identity]
flow = "device_code"

[warehouse]
host = "adb-1.azuredatabricks.net"
"#,
        )
        .unwrap();
        assert_eq!(config.identity.flow, IdentityFlow::DeviceCode);
        assert_eq!(config.warehouse.token_lifetime_secs, 86_400);
        assert!(!config.warehouse.revoke_previous);
        assert_eq!(config.powerbi.oaep_hash, OaepHash::Sha256);
        assert!(config.gateway.is_none());
        assert!(config.dataset.is_none());
    }

    #[test]
    fn missing_identity_table_keeps_default_authority() {
        let config = RotationConfig::from_toml_str(
            r#"
[warehouse]
host = "adb-1.azuredatabricks.net"
"#,
        )
        .unwrap();
        assert_eq!(config.identity.flow, IdentityFlow::ClientSecret);
        assert_eq!(config.identity.authority, DEFAULT_AUTHORITY);
        assert!(config.identity.tenant_id.is_none());
    }

    #[test]
    fn unknown_flow_is_rejected() {
        let err = RotationConfig::from_toml_str(
            r#"
[identity]
flow = "password"

[warehouse]
host = "h"
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("password"));
    }

    #[test]
    fn env_overrides_identity() {
        let mut config = RotationConfig::from_toml_str(FULL).unwrap();
        config.apply_overrides(env(&[
            (ENV_TENANT_ID, "tenant-env"),
            (ENV_CLIENT_SECRET, "s3cr3t"),
            (ENV_CLIENT_ID, "  "),
        ]));
        assert_eq!(config.identity.tenant_id.as_deref(), Some("tenant-env"));
        assert_eq!(config.identity.client_id.as_deref(), Some("client-1"));
        assert_eq!(config.identity.client_secret.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn client_secret_flow_requires_secret() {
        let config = RotationConfig::from_toml_str(FULL).unwrap();
        let err = config.validate(true).unwrap_err();
        assert!(err.to_string().contains(ENV_CLIENT_SECRET));
    }

    #[test]
    fn rotate_requires_a_target() {
        let mut config = RotationConfig::from_toml_str(FULL).unwrap();
        config.apply_overrides(env(&[(ENV_CLIENT_SECRET, "s3cr3t")]));
        config.gateway = None;
        config.dataset = None;

        assert!(config.validate(false).is_ok());
        let err = config.validate(true).unwrap_err();
        assert!(err.to_string().contains("nothing to rotate"));
    }

    #[test]
    fn zero_lifetime_is_rejected() {
        let mut config = RotationConfig::from_toml_str(FULL).unwrap();
        config.apply_overrides(env(&[(ENV_CLIENT_SECRET, "s3cr3t")]));
        config.warehouse.token_lifetime_secs = 0;
        assert!(config.validate(true).is_err());
    }

    #[test]
    fn device_code_flow_needs_no_secret() {
        let mut config = RotationConfig::from_toml_str(FULL).unwrap();
        config.identity.flow = IdentityFlow::DeviceCode;
        config.identity.client_id = None;
        assert!(config.validate(true).is_ok());

        let provider = config.build_provider().unwrap();
        assert_eq!(provider.flow_name(), "device_code");
    }

    #[test]
    fn builds_client_secret_provider() {
        let mut config = RotationConfig::from_toml_str(FULL).unwrap();
        config.apply_overrides(env(&[(ENV_CLIENT_SECRET, "s3cr3t")]));
        let provider = config.build_provider().unwrap();
        assert_eq!(provider.flow_name(), "client_secret");
    }

    #[test]
    fn debug_hides_client_secret() {
        let mut config = RotationConfig::from_toml_str(FULL).unwrap();
        config.apply_overrides(env(&[(ENV_CLIENT_SECRET, "s3cr3t")]));
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = RotationConfig::load(file.path()).unwrap();
        assert_eq!(config.warehouse.host, "adb-123.azuredatabricks.net");
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = RotationConfig::load(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.toml"));
    }
}
