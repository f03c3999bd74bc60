//! Gateway public keys and the OAEP hash selection.
//!
//! A Power BI gateway publishes its RSA public key as a pair of base64
//! strings (`exponent`, `modulus`) inside the `publicKey` field of
//! `GET /gateways/{id}`.  [`GatewayPublicKey`] is that wire shape;
//! [`RecipientKey`] is the validated RSA key the engine encrypts under.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, Result};

/// Smallest modulus accepted for a recipient key, in bits.
pub const MIN_MODULUS_BITS: usize = 2048;

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

/// RSA public key exactly as the reporting service returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPublicKey {
    /// Base64 big-endian public exponent (usually `AQAB`).
    pub exponent: String,
    /// Base64 big-endian modulus.
    pub modulus: String,
}

impl GatewayPublicKey {
    /// Build the wire shape from an RSA public key.
    pub fn from_rsa(key: &RsaPublicKey) -> Self {
        Self {
            exponent: STANDARD.encode(key.e().to_bytes_be()),
            modulus: STANDARD.encode(key.n().to_bytes_be()),
        }
    }
}

// ---------------------------------------------------------------------------
// OAEP hash
// ---------------------------------------------------------------------------

/// Digest used for both the OAEP label hash and MGF1.
///
/// OAEP is not negotiated at decrypt time, so this must match what the
/// receiving gateway uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OaepHash {
    /// SHA-1, used by older gateway clients.
    Sha1,
    /// SHA-256.
    #[default]
    Sha256,
}

impl OaepHash {
    /// Fresh padding scheme for one RSA operation.
    pub(crate) fn padding(self) -> Oaep {
        match self {
            Self::Sha1 => Oaep::new::<sha1::Sha1>(),
            Self::Sha256 => Oaep::new::<sha2::Sha256>(),
        }
    }
}

impl fmt::Display for OaepHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "sha1"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

impl FromStr for OaepHash {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(format!("unsupported OAEP hash `{other}` (expected sha1 or sha256)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Validated key
// ---------------------------------------------------------------------------

/// A validated RSA public key that credentials can be encrypted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientKey {
    inner: RsaPublicKey,
}

impl RecipientKey {
    /// Decode and validate a gateway's published key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if either component is not valid
    /// base64, is empty, or the modulus is smaller than
    /// [`MIN_MODULUS_BITS`].
    pub fn from_gateway(key: &GatewayPublicKey) -> Result<Self> {
        let modulus = decode_component("modulus", &key.modulus)?;
        let exponent = decode_component("exponent", &key.exponent)?;

        let bits = bit_length(&modulus);
        if bits < MIN_MODULUS_BITS {
            return Err(CryptoError::InvalidKey {
                reason: format!("modulus is {bits} bits, minimum is {MIN_MODULUS_BITS}"),
            });
        }

        let inner = RsaPublicKey::new(
            BigUint::from_bytes_be(&modulus),
            BigUint::from_bytes_be(&exponent),
        )
        .map_err(|e| CryptoError::InvalidKey {
            reason: format!("rejected RSA key: {e}"),
        })?;

        tracing::debug!(modulus_bits = bits, "parsed gateway public key");

        Ok(Self { inner })
    }

    /// Wrap an RSA key that is already in memory, enforcing the size floor.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the modulus is too small.
    pub fn from_rsa(key: RsaPublicKey) -> Result<Self> {
        let bits = bit_length(&key.n().to_bytes_be());
        if bits < MIN_MODULUS_BITS {
            return Err(CryptoError::InvalidKey {
                reason: format!("modulus is {bits} bits, minimum is {MIN_MODULUS_BITS}"),
            });
        }
        Ok(Self { inner: key })
    }

    /// Modulus size in bits.
    pub fn modulus_bits(&self) -> usize {
        bit_length(&self.inner.n().to_bytes_be())
    }

    /// Modulus size in bytes; also the length of every RSA ciphertext block.
    pub fn modulus_len(&self) -> usize {
        self.inner.size()
    }

    pub(crate) fn as_rsa(&self) -> &RsaPublicKey {
        &self.inner
    }
}

fn decode_component(name: &str, value: &str) -> Result<Vec<u8>> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|e| CryptoError::InvalidKey {
            reason: format!("{name} is not valid base64: {e}"),
        })?;

    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let trimmed = bytes[first_nonzero..].to_vec();
    if trimmed.is_empty() {
        return Err(CryptoError::InvalidKey {
            reason: format!("{name} is empty"),
        });
    }
    Ok(trimmed)
}

/// Number of significant bits in a big-endian unsigned integer.
fn bit_length(bytes: &[u8]) -> usize {
    match bytes.iter().position(|b| *b != 0) {
        Some(i) => (bytes.len() - i - 1) * 8 + (8 - bytes[i].leading_zeros() as usize),
        None => 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_length_counts_significant_bits() {
        assert_eq!(bit_length(&[]), 0);
        assert_eq!(bit_length(&[0, 0]), 0);
        assert_eq!(bit_length(&[0x01]), 1);
        assert_eq!(bit_length(&[0x80]), 8);
        assert_eq!(bit_length(&[0x00, 0x01, 0x00]), 9);
        assert_eq!(bit_length(&[0xC0; 256]), 2048);
    }

    #[test]
    fn small_modulus_rejected_before_rsa_parsing() {
        let mut modulus = vec![0xC3_u8; 64];
        modulus[63] |= 1;
        let key = GatewayPublicKey {
            exponent: "AQAB".to_string(),
            modulus: STANDARD.encode(&modulus),
        };

        let err = RecipientKey::from_gateway(&key).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey { .. }));
        assert!(err.to_string().contains("512 bits"));
    }

    #[test]
    fn malformed_base64_rejected() {
        let key = GatewayPublicKey {
            exponent: "AQAB".to_string(),
            modulus: "not base64 at all!".to_string(),
        };
        let err = RecipientKey::from_gateway(&key).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey { .. }));
    }

    #[test]
    fn empty_exponent_rejected() {
        let key = GatewayPublicKey {
            exponent: String::new(),
            modulus: STANDARD.encode([0xC3_u8; 256]),
        };
        let err = RecipientKey::from_gateway(&key).unwrap_err();
        assert!(err.to_string().contains("exponent is empty"));
    }

    #[test]
    fn leading_zero_modulus_byte_is_ignored_for_sizing() {
        // 255 significant bytes behind a zero byte is still under 2048 bits.
        let mut modulus = vec![0u8];
        modulus.extend(std::iter::repeat_n(0xFF_u8, 255));
        let key = GatewayPublicKey {
            exponent: "AQAB".to_string(),
            modulus: STANDARD.encode(&modulus),
        };
        let err = RecipientKey::from_gateway(&key).unwrap_err();
        assert!(err.to_string().contains("2040 bits"));
    }

    #[test]
    fn gateway_key_json_shape() {
        let json = r#"{ "exponent": "AQAB", "modulus": "xyz=" }"#;
        let key: GatewayPublicKey = serde_json::from_str(json).unwrap();
        assert_eq!(key.exponent, "AQAB");
        assert_eq!(key.modulus, "xyz=");
    }

    #[test]
    fn oaep_hash_parsing() {
        assert_eq!("sha256".parse::<OaepHash>().unwrap(), OaepHash::Sha256);
        assert_eq!("SHA-256".parse::<OaepHash>().unwrap(), OaepHash::Sha256);
        assert_eq!("sha1".parse::<OaepHash>().unwrap(), OaepHash::Sha1);
        assert!("md5".parse::<OaepHash>().is_err());
        assert_eq!(OaepHash::default(), OaepHash::Sha256);
    }

    #[test]
    fn oaep_hash_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&OaepHash::Sha1).unwrap(), "\"sha1\"");
        let hash: OaepHash = serde_json::from_str("\"sha256\"").unwrap();
        assert_eq!(hash, OaepHash::Sha256);
        assert_eq!(OaepHash::Sha1.to_string(), "sha1");
    }
}
