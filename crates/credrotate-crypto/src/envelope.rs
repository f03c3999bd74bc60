//! Authenticated symmetric layer: AES-256-CBC (PKCS#7) then HMAC-SHA256.
//!
//! The gateway decrypts with an encrypt-then-MAC construction whose output
//! layout is fixed:
//!
//! ```text
//! [alg_enc:1][alg_mac:1][tag:32][iv:16][ciphertext:n*16]
//! ```
//!
//! The tag is computed over `alg_enc ‖ alg_mac ‖ iv ‖ ciphertext`.  Both
//! algorithm bytes are zero (AES-256-CBC-PKCS7 and HMAC-SHA256 are the only
//! identifiers the receiver knows).

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};

/// AES-256 key length in bytes.
pub const ENC_KEY_LEN: usize = 32;

/// HMAC-SHA256 key length in bytes.
pub const MAC_KEY_LEN: usize = 64;

/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = 16;

/// HMAC-SHA256 tag length in bytes.
pub const TAG_LEN: usize = 32;

/// Algorithm identifier bytes that prefix both the payload and the MAC input.
pub const ALGORITHM_CHOICES: [u8; 2] = [ALG_AES256_CBC_PKCS7, ALG_HMAC_SHA256];

const ALG_AES256_CBC_PKCS7: u8 = 0;
const ALG_HMAC_SHA256: u8 = 0;

/// Bytes preceding the ciphertext in a sealed payload.
pub const HEADER_LEN: usize = ALGORITHM_CHOICES.len() + TAG_LEN + IV_LEN;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

// ---------------------------------------------------------------------------
// Ephemeral keys
// ---------------------------------------------------------------------------

/// A freshly generated encryption key and MAC key pair.
///
/// Both buffers are wiped on drop.
pub struct SessionKeys {
    pub(crate) enc: Zeroizing<[u8; ENC_KEY_LEN]>,
    pub(crate) mac: Zeroizing<[u8; MAC_KEY_LEN]>,
}

impl SessionKeys {
    /// Draw a new key pair from the system CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the CSPRNG fails.
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();
        let mut enc = Zeroizing::new([0u8; ENC_KEY_LEN]);
        let mut mac = Zeroizing::new([0u8; MAC_KEY_LEN]);
        rng.fill(enc.as_mut())
            .and_then(|()| rng.fill(mac.as_mut()))
            .map_err(|_| CryptoError::Encryption {
                reason: "failed to generate session keys".into(),
            })?;
        Ok(Self { enc, mac })
    }

    pub(crate) fn from_parts(enc: &[u8], mac: &[u8]) -> Result<Self> {
        if enc.len() != ENC_KEY_LEN || mac.len() != MAC_KEY_LEN {
            return Err(CryptoError::Decryption {
                reason: format!(
                    "session keys must be {ENC_KEY_LEN}+{MAC_KEY_LEN} bytes, got {}+{}",
                    enc.len(),
                    mac.len()
                ),
            });
        }
        let mut keys = Self {
            enc: Zeroizing::new([0u8; ENC_KEY_LEN]),
            mac: Zeroizing::new([0u8; MAC_KEY_LEN]),
        };
        keys.enc.copy_from_slice(enc);
        keys.mac.copy_from_slice(mac);
        Ok(keys)
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Seal / open
// ---------------------------------------------------------------------------

/// Encrypt and authenticate `plaintext` under `keys` with a random IV.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if IV generation or cipher setup
/// fails.
pub fn seal(keys: &SessionKeys, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut iv = [0u8; IV_LEN];
    SystemRandom::new()
        .fill(&mut iv)
        .map_err(|_| CryptoError::Encryption {
            reason: "failed to generate random IV".into(),
        })?;

    let ciphertext = Aes256CbcEnc::new_from_slices(keys.enc.as_ref(), &iv)
        .map_err(|_| CryptoError::Encryption {
            reason: "failed to initialise AES-256-CBC".into(),
        })?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let tag = compute_tag(keys, &iv, &ciphertext);

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.extend_from_slice(&ALGORITHM_CHOICES);
    out.extend_from_slice(tag.as_ref());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);

    tracing::trace!(
        plaintext_len = plaintext.len(),
        sealed_len = out.len(),
        "sealed credential payload"
    );

    Ok(out)
}

/// Verify and decrypt a payload produced by [`seal`].
///
/// # Errors
///
/// Returns [`CryptoError::Decryption`] on a short payload, unknown algorithm
/// bytes, tag mismatch, or invalid padding.
pub fn open(keys: &SessionKeys, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < HEADER_LEN + IV_LEN {
        return Err(CryptoError::Decryption {
            reason: format!("payload too short: {} bytes", sealed.len()),
        });
    }

    let (algorithms, rest) = sealed.split_at(ALGORITHM_CHOICES.len());
    if algorithms != ALGORITHM_CHOICES.as_slice() {
        return Err(CryptoError::Decryption {
            reason: format!("unsupported algorithm identifiers {algorithms:?}"),
        });
    }
    let (tag, rest) = rest.split_at(TAG_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);

    let key = hmac::Key::new(hmac::HMAC_SHA256, keys.mac.as_ref());
    hmac::verify(&key, &mac_input(iv, ciphertext), tag).map_err(|_| {
        CryptoError::Decryption {
            reason: "authentication tag mismatch".into(),
        }
    })?;

    Aes256CbcDec::new_from_slices(keys.enc.as_ref(), iv)
        .map_err(|_| CryptoError::Decryption {
            reason: "failed to initialise AES-256-CBC".into(),
        })?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Decryption {
            reason: "invalid PKCS#7 padding".into(),
        })
}

fn compute_tag(keys: &SessionKeys, iv: &[u8], ciphertext: &[u8]) -> hmac::Tag {
    let key = hmac::Key::new(hmac::HMAC_SHA256, keys.mac.as_ref());
    hmac::sign(&key, &mac_input(iv, ciphertext))
}

fn mac_input(iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(ALGORITHM_CHOICES.len() + iv.len() + ciphertext.len());
    data.extend_from_slice(&ALGORITHM_CHOICES);
    data.extend_from_slice(iv);
    data.extend_from_slice(ciphertext);
    data
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
