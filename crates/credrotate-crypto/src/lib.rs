//! Credential encryption engine for credrotate.
//!
//! Packages a credential (typically a freshly minted warehouse access token)
//! for an on-premises Power BI gateway.  The gateway only accepts one binary
//! layout, so everything here is pinned byte for byte:
//!
//! - [`key`]: the gateway's published RSA key and the OAEP hash choice.
//! - [`envelope`]: AES-256-CBC + HMAC-SHA256 authenticated payload.
//! - [`credential`]: RSA-OAEP wrapping of the session keys and the final
//!   base64 blob, plus the inverse used in tests and diagnostics.
//! - [`error`]: unified error type.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use credrotate_crypto::{CredentialPlaintext, GatewayPublicKey, OaepHash, RecipientKey};
//!
//! # fn example(published: GatewayPublicKey) -> credrotate_crypto::Result<()> {
//! let recipient = RecipientKey::from_gateway(&published)?;
//! let plaintext = CredentialPlaintext::key("dapi0123456789");
//! let blob = credrotate_crypto::encode_credentials(
//!     &recipient,
//!     plaintext.as_str(),
//!     OaepHash::Sha256,
//! )?;
//! println!("credentials: {}", blob.as_str());
//! # Ok(())
//! # }
//! ```

pub mod credential;
pub mod envelope;
pub mod error;
pub mod key;

pub use credential::{
    CredentialPlaintext, EncryptedCredential, decode_credentials, encode_credentials,
    load_private_key_pem,
};
pub use error::{CryptoError, Result};
pub use key::{GatewayPublicKey, MIN_MODULUS_BITS, OaepHash, RecipientKey};

// Re-exported so callers can hold keys for `decode_credentials` without a
// direct `rsa` dependency.
pub use rsa::{RsaPrivateKey, RsaPublicKey};
