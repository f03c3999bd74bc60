//! Identity provider client for credrotate.
//!
//! Obtains bearer tokens from Entra ID for the two services the rotation job
//! talks to (Power BI and Azure Databricks).  Two flows are supported:
//!
//! - **Client credentials**: a service principal with a client secret, for
//!   unattended runs.
//! - **Device Authorization Grant** (RFC 8628): a person signs in from a
//!   browser, for interactive runs.
//!
//! Both implement [`AccessTokenProvider`], which is what the service
//! adapters depend on.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use credrotate_auth::{
//!     AccessTokenProvider, ClientSecretConfig, ClientSecretCredential, DEFAULT_AUTHORITY,
//!     POWER_BI_SCOPE,
//! };
//!
//! # async fn example() -> credrotate_auth::Result<()> {
//! let credential = ClientSecretCredential::new(ClientSecretConfig {
//!     authority: DEFAULT_AUTHORITY.to_string(),
//!     tenant_id: "contoso.onmicrosoft.com".to_string(),
//!     client_id: "00000000-0000-0000-0000-000000000000".to_string(),
//!     client_secret: std::env::var("CREDROTATE_CLIENT_SECRET").unwrap_or_default(),
//! })?;
//!
//! let token = credential.get_token(POWER_BI_SCOPE).await?;
//! println!("expires at {:?}", token.expires_at);
//! # Ok(())
//! # }
//! ```

pub mod client_secret;
pub mod device_code;
pub mod error;
pub mod provider;

pub use client_secret::{ClientSecretConfig, ClientSecretCredential};
pub use device_code::{
    DEFAULT_PUBLIC_CLIENT_ID, DeviceCodeConfig, DeviceCodeCredential, DeviceCodeResponse,
};
pub use error::{AuthError, Result};
pub use provider::{
    AZURE_DATABRICKS_SCOPE, AccessToken, AccessTokenProvider, Authority, DEFAULT_AUTHORITY,
    POWER_BI_SCOPE,
};
