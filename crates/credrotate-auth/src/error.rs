//! Error types for the auth crate.
//!
//! All identity operations surface errors through [`AuthError`].  Each
//! variant carries enough context for the rotation job to report why a
//! bearer token could not be obtained.

/// Unified error type for the credrotate identity client.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token endpoint rejected the grant (bad secret, revoked refresh
    /// token, missing consent, ...).
    #[error("invalid grant: {reason}")]
    InvalidGrant {
        /// Explanation from the authorization server.
        reason: String,
    },

    /// The device-code flow failed for a reason other than a rejected grant.
    #[error("authentication flow failed: {reason}")]
    FlowFailed {
        /// Details about why the flow failed.
        reason: String,
    },

    /// The user did not finish the device-code sign-in in time.
    #[error("device code sign-in timed out after {timeout_secs} seconds")]
    Timeout {
        /// How many seconds we waited before giving up.
        timeout_secs: u64,
    },

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// An HTTP request to the token endpoint failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The configured authority is not a valid URL.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
