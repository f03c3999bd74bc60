//! Crypto error types.
//!
//! Every fallible operation in this crate surfaces errors through
//! [`CryptoError`].  None of the variants carry plaintext or key material;
//! reasons describe what failed, never the data it failed on.

/// Unified error type for the credential encryption engine.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The recipient public key is malformed or below the accepted size.
    #[error("invalid public key: {reason}")]
    InvalidKey { reason: String },

    /// The credential payload to encrypt was empty.
    #[error("credentials must not be empty")]
    EmptyCredentials,

    /// A cipher primitive failed while encrypting.  Not expected under valid
    /// inputs and never worth retrying.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// The blob could not be unwrapped (bad layout, wrong key, wrong OAEP
    /// hash, tag mismatch, or invalid padding).
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },
}

/// Convenience alias used throughout the crypto crate.
pub type Result<T> = std::result::Result<T, CryptoError>;
