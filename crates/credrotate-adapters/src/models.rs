//! Request and response shapes for the Power BI and Databricks APIs.
//!
//! Only the fields the rotation job needs are modelled; unknown fields in
//! responses are ignored.

use chrono::{DateTime, Utc};
use credrotate_crypto::{CredentialPlaintext, EncryptedCredential, GatewayPublicKey};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Power BI
// ---------------------------------------------------------------------------

/// The `credentialDetails` object sent when updating a datasource.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDetails {
    pub credential_type: String,
    pub credentials: String,
    pub encrypted_connection: String,
    pub encryption_algorithm: String,
    pub privacy_level: String,
}

impl CredentialDetails {
    /// Key credentials encrypted for a gateway.
    pub fn encrypted_key(blob: &EncryptedCredential) -> Self {
        Self {
            credential_type: "Key".to_string(),
            credentials: blob.as_str().to_string(),
            encrypted_connection: "Encrypted".to_string(),
            encryption_algorithm: "RSA-OAEP".to_string(),
            privacy_level: "None".to_string(),
        }
    }

    /// Key credentials sent in the clear, for cloud datasources bound to a
    /// dataset.
    pub fn plain_key(plaintext: &CredentialPlaintext) -> Self {
        Self {
            credential_type: "Key".to_string(),
            credentials: plaintext.as_str().to_string(),
            encrypted_connection: "Encrypted".to_string(),
            encryption_algorithm: "None".to_string(),
            privacy_level: "None".to_string(),
        }
    }
}

impl std::fmt::Debug for CredentialDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialDetails")
            .field("credential_type", &self.credential_type)
            .field("credentials", &"<redacted>")
            .field("encrypted_connection", &self.encrypted_connection)
            .field("encryption_algorithm", &self.encryption_algorithm)
            .field("privacy_level", &self.privacy_level)
            .finish()
    }
}

/// Body of `PATCH /gateways/{id}/datasources/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateDatasourceRequest<'a> {
    pub(crate) credential_details: &'a CredentialDetails,
}

/// A gateway as listed by `GET /gateways`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public_key: Option<GatewayPublicKey>,
}

/// A datasource registered on a gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayDatasource {
    pub id: String,
    pub datasource_name: String,
    #[serde(default)]
    pub datasource_type: Option<String>,
}

/// A datasource bound to a dataset, as listed by
/// `GET /groups/{ws}/datasets/{ds}/datasources`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDatasource {
    #[serde(default)]
    pub datasource_id: Option<String>,
    #[serde(default)]
    pub gateway_id: Option<String>,
    #[serde(default)]
    pub datasource_type: Option<String>,
}

/// OData collection wrapper used by every Power BI list endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ODataList<T> {
    pub(crate) value: Vec<T>,
}

// ---------------------------------------------------------------------------
// Databricks
// ---------------------------------------------------------------------------

/// Metadata of a personal access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_id: String,
    #[serde(default)]
    pub comment: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub creation_time: Option<i64>,
    /// Milliseconds since the epoch, `-1` for tokens that never expire.
    #[serde(default)]
    pub expiry_time: Option<i64>,
}

impl TokenInfo {
    /// When the token was created, if the server reported it.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.creation_time.and_then(DateTime::from_timestamp_millis)
    }

    /// When the token expires; `None` for non-expiring tokens.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry_time
            .filter(|ms| *ms >= 0)
            .and_then(DateTime::from_timestamp_millis)
    }
}

/// A freshly created personal access token.
#[derive(Clone)]
pub struct WarehouseToken {
    /// The secret token value (`dapi...`).
    pub value: String,
    pub info: TokenInfo,
}

impl std::fmt::Debug for WarehouseToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseToken")
            .field("value", &"<redacted>")
            .field("info", &self.info)
            .finish()
    }
}
