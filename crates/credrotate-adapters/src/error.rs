//! Adapter error types.
//!
//! All service adapters surface errors through [`AdapterError`].  Each
//! variant carries enough context for the rotation job to report which call
//! failed without inspecting opaque strings.

use credrotate_auth::AuthError;
use credrotate_crypto::CryptoError;

/// Unified error type for credrotate adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// A remote API answered with a non-success status.
    #[error("{service} returned HTTP {status}: {body}")]
    Upstream {
        /// Which service answered (`powerbi`, `databricks`).
        service: &'static str,
        status: u16,
        /// Response body, or the extracted error message when the body is
        /// structured.
        body: String,
    },

    /// A lookup by name found nothing.
    #[error("{kind} not found: `{name}`")]
    NotFound { kind: &'static str, name: String },

    /// A success response did not have the expected shape.
    #[error("unexpected response: {reason}")]
    UnexpectedResponse { reason: String },

    /// A bearer token could not be obtained.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The gateway key was unusable or encryption failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The HTTP request itself failed (connect, TLS, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_display() {
        let err = AdapterError::Upstream {
            service: "powerbi",
            status: 403,
            body: "PowerBINotAuthorizedException".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "powerbi returned HTTP 403: PowerBINotAuthorizedException"
        );
    }

    #[test]
    fn not_found_display() {
        let err = AdapterError::NotFound {
            kind: "gateway",
            name: "SalesGateway".to_string(),
        };
        assert_eq!(err.to_string(), "gateway not found: `SalesGateway`");
    }

    #[test]
    fn crypto_errors_convert() {
        let err: AdapterError = CryptoError::EmptyCredentials.into();
        assert!(matches!(err, AdapterError::Crypto(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AdapterError>();
    }
}
