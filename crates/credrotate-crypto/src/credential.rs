//! Hybrid credential encryption for gateway datasources.
//!
//! [`encode_credentials`] produces the blob the reporting service accepts as
//! a `Key` credential with `encryptionAlgorithm: RSA-OAEP`:
//!
//! ```text
//! base64( RSA-OAEP(key_block) ‖ sealed_payload )
//!
//! key_block      = [0x00][0x01][aes_key:32][hmac_key:64]
//! sealed_payload = see crate::envelope
//! ```
//!
//! The two leading key-block bytes are length codes (`0` = 32 bytes,
//! `1` = 64 bytes).  The RSA block is exactly the modulus length, so the
//! receiver splits the blob without a length prefix.
//!
//! The blob is one base64 string over the joined bytes.  Some published
//! gateway helpers instead join two separately base64-encoded parts (key
//! block, then payload); which form a given gateway accepts has not been
//! confirmed here and should be checked against a live gateway.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::RsaPrivateKey;
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::envelope::{self, ENC_KEY_LEN, MAC_KEY_LEN, SessionKeys};
use crate::error::{CryptoError, Result};
use crate::key::{OaepHash, RecipientKey};

const KEY_LENGTH_32: u8 = 0;
const KEY_LENGTH_64: u8 = 1;
const KEY_BLOCK_LEN: usize = 2 + ENC_KEY_LEN + MAC_KEY_LEN;

// ---------------------------------------------------------------------------
// Plaintext
// ---------------------------------------------------------------------------

/// The credential document handed to the engine.
///
/// `Debug` never prints the contents.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPlaintext(String);

impl CredentialPlaintext {
    /// `{"credentialData":[{"name":"key","value":<token>}]}` for a key
    /// credential such as a warehouse access token.
    pub fn key(token: &str) -> Self {
        let doc = serde_json::json!({
            "credentialData": [{ "name": "key", "value": token }],
        });
        Self(doc.to_string())
    }

    /// Use an already serialized credential document verbatim.
    pub fn raw(document: impl Into<String>) -> Self {
        Self(document.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for CredentialPlaintext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialPlaintext({} bytes)", self.0.len())
    }
}

// ---------------------------------------------------------------------------
// Ciphertext
// ---------------------------------------------------------------------------

/// Base64 hybrid ciphertext, ready for the `credentials` request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EncryptedCredential(String);

impl EncryptedCredential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` for the holder of `recipient`'s private key.
///
/// Every call draws a new AES key, HMAC key and IV, so identical inputs
/// never produce identical output.
///
/// # Errors
///
/// Returns [`CryptoError::EmptyCredentials`] for an empty plaintext and
/// [`CryptoError::Encryption`] if a primitive fails.
pub fn encode_credentials(
    recipient: &RecipientKey,
    plaintext: &str,
    hash: OaepHash,
) -> Result<EncryptedCredential> {
    if plaintext.is_empty() {
        return Err(CryptoError::EmptyCredentials);
    }

    let keys = SessionKeys::generate()?;
    let sealed = envelope::seal(&keys, plaintext.as_bytes())?;

    let mut key_block = Zeroizing::new(Vec::with_capacity(KEY_BLOCK_LEN));
    key_block.extend_from_slice(&[KEY_LENGTH_32, KEY_LENGTH_64]);
    key_block.extend_from_slice(keys.enc.as_ref());
    key_block.extend_from_slice(keys.mac.as_ref());

    let wrapped = recipient
        .as_rsa()
        .encrypt(&mut OsRng, hash.padding(), &key_block)
        .map_err(|e| CryptoError::Encryption {
            reason: format!("RSA-OAEP ({hash}) wrap failed: {e}"),
        })?;

    let mut blob = Vec::with_capacity(wrapped.len() + sealed.len());
    blob.extend_from_slice(&wrapped);
    blob.extend_from_slice(&sealed);

    tracing::debug!(
        oaep_hash = %hash,
        modulus_bits = recipient.modulus_bits(),
        blob_len = blob.len(),
        "encrypted gateway credential"
    );

    Ok(EncryptedCredential(STANDARD.encode(blob)))
}

/// Reverse [`encode_credentials`] with the recipient's private key.
///
/// This is the gateway's side of the exchange; it exists to pin the blob
/// format and to diagnose rejected payloads against a test key pair.
///
/// # Errors
///
/// Returns [`CryptoError::Decryption`] if the blob is malformed, was made for
/// another key or OAEP hash, or fails authentication.
pub fn decode_credentials(
    private_key: &RsaPrivateKey,
    blob: &str,
    hash: OaepHash,
) -> Result<String> {
    let bytes = STANDARD
        .decode(blob.trim())
        .map_err(|e| CryptoError::Decryption {
            reason: format!("blob is not valid base64: {e}"),
        })?;

    let rsa_len = private_key.size();
    if bytes.len() <= rsa_len {
        return Err(CryptoError::Decryption {
            reason: format!(
                "blob is {} bytes, shorter than the {rsa_len}-byte key block",
                bytes.len()
            ),
        });
    }
    let (wrapped, sealed) = bytes.split_at(rsa_len);

    let key_block = Zeroizing::new(private_key.decrypt(hash.padding(), wrapped).map_err(
        |e| CryptoError::Decryption {
            reason: format!("RSA-OAEP ({hash}) unwrap failed: {e}"),
        },
    )?);

    if key_block.len() != KEY_BLOCK_LEN || key_block[..2] != [KEY_LENGTH_32, KEY_LENGTH_64] {
        return Err(CryptoError::Decryption {
            reason: "unexpected key block layout".into(),
        });
    }
    let keys = SessionKeys::from_parts(
        &key_block[2..2 + ENC_KEY_LEN],
        &key_block[2 + ENC_KEY_LEN..],
    )?;

    let plaintext = envelope::open(&keys, sealed)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption {
        reason: "plaintext is not UTF-8".into(),
    })
}

/// Parse a PEM private key (PKCS#8 `PRIVATE KEY` or PKCS#1
/// `RSA PRIVATE KEY`).
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] if neither encoding parses.
pub fn load_private_key_pem(pem: &str) -> Result<RsaPrivateKey> {
    use rsa::pkcs1::DecodeRsaPrivateKey;
    use rsa::pkcs8::DecodePrivateKey;

    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey {
            reason: format!("unreadable private key PEM: {e}"),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_credential_json_shape() {
        let plaintext = CredentialPlaintext::key("dapiABC123");
        assert_eq!(
            plaintext.as_str(),
            r#"{"credentialData":[{"name":"key","value":"dapiABC123"}]}"#
        );
    }

    #[test]
    fn key_credential_escapes_token() {
        let plaintext = CredentialPlaintext::key(r#"a"b\c"#);
        let parsed: serde_json::Value = serde_json::from_str(plaintext.as_str()).unwrap();
        assert_eq!(parsed["credentialData"][0]["value"], r#"a"b\c"#);
    }

    #[test]
    fn key_credential_is_never_empty() {
        for token in ["", "\u{0}", "\u{1F511}\n\t", "dapi\u{7f}"] {
            let plaintext = CredentialPlaintext::key(token);
            assert!(!plaintext.is_empty());
            let parsed: serde_json::Value = serde_json::from_str(plaintext.as_str()).unwrap();
            assert_eq!(parsed["credentialData"][0]["name"], "key");
            assert_eq!(parsed["credentialData"][0]["value"], token);
        }
    }

    #[test]
    fn plaintext_debug_is_redacted() {
        let plaintext = CredentialPlaintext::raw("dapi-secret");
        let debug = format!("{plaintext:?}");
        assert!(!debug.contains("dapi-secret"));
        assert_eq!(debug, "CredentialPlaintext(11 bytes)");
    }

    #[test]
    fn encrypted_credential_serializes_as_string() {
        let blob = EncryptedCredential("QUJD".to_string());
        assert_eq!(serde_json::to_string(&blob).unwrap(), "\"QUJD\"");
    }

    #[test]
    fn decode_rejects_non_base64() {
        let key = test_private_key();
        let err = decode_credentials(&key, "%%%", OaepHash::Sha256).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption { .. }));
    }

    #[test]
    fn decode_rejects_truncated_blob() {
        let key = test_private_key();
        let err = decode_credentials(&key, &STANDARD.encode([0u8; 64]), OaepHash::Sha256)
            .unwrap_err();
        assert!(err.to_string().contains("shorter than"));
    }

    #[test]
    fn load_private_key_rejects_garbage() {
        let err = load_private_key_pem("-----BEGIN NOTHING-----").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey { .. }));
    }

    fn test_private_key() -> RsaPrivateKey {
        load_private_key_pem(include_str!("../tests/fixtures/gateway_2048.pem")).unwrap()
    }
}
