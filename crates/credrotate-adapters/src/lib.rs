//! Service adapters for credrotate.
//!
//! Two remote services take part in a rotation:
//!
//! - **Power BI** ([`PowerBiClient`], [`ReportingService`]): gateway and
//!   dataset lookups and the datasource credential update.
//! - **Databricks** ([`DatabricksTokenClient`], [`TokenLifecycle`]): the
//!   personal access tokens being rotated.
//!
//! Both clients authenticate through a shared
//! [`AccessTokenProvider`](credrotate_auth::AccessTokenProvider) and cache
//! the bearer token per scope until it nears expiry.

pub mod databricks;
pub mod error;
mod http;
pub mod models;
pub mod powerbi;
pub mod traits;

pub use databricks::DatabricksTokenClient;
pub use error::{AdapterError, Result};
pub use models::{
    CredentialDetails, DatasetDatasource, Gateway, GatewayDatasource, TokenInfo, WarehouseToken,
};
pub use powerbi::{DEFAULT_API_BASE, PowerBiClient};
pub use traits::{ReportingService, TokenLifecycle};
