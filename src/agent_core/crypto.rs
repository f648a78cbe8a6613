//! Symmetric primitives behind cookie protection: key derivation and
//! AES-256-CBC with PKCS#7 padding.
//!
//! CBC carries no integrity tag. A tampered ciphertext can decrypt to a
//! different plaintext instead of failing, so callers must treat every
//! decrypted artifact as untrusted input.

use std::num::NonZeroU32;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use lazy_static::lazy_static;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use super::types::{ConfigurationError, DecryptionError};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Cipher block size; the IV is one block.
pub const IV_LEN: usize = 16;
/// AES-256 key length.
pub const KEY_LEN: usize = 32;

lazy_static! {
    /// Process-wide CSPRNG. ring caches its state internally, so one
    /// instance serves all callers.
    static ref SYSTEM_RANDOM: SystemRandom = SystemRandom::new();
    /// Iteration count for the PBKDF2 derivation mode.
    static ref PBKDF2_ITERATIONS: NonZeroU32 =
        NonZeroU32::new(65_536).expect("iteration count is nonzero");
}

/// How the configured secret becomes the AES-256 cookie key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum KeyDerivation {
    /// Use the secret's bytes directly. The secret must be exactly
    /// 32 bytes; this is the mode peers that decrypt the same cookies
    /// expect.
    Raw,
    /// Stretch the secret with PBKDF2-HMAC-SHA256 over the given salt.
    Pbkdf2 { salt: String },
}

impl Default for KeyDerivation {
    fn default() -> Self {
        KeyDerivation::Raw
    }
}

/// Derive the process-lifetime cookie key from the configured secret.
pub fn derive_cookie_key(
    secret: &str,
    derivation: &KeyDerivation,
) -> Result<[u8; KEY_LEN], ConfigurationError> {
    match derivation {
        KeyDerivation::Raw => {
            let bytes = secret.as_bytes();
            if bytes.len() != KEY_LEN {
                return Err(ConfigurationError::InvalidKeyLength(bytes.len()));
            }
            let mut key = [0u8; KEY_LEN];
            key.copy_from_slice(bytes);
            Ok(key)
        }
        KeyDerivation::Pbkdf2 { salt } => {
            if salt.is_empty() {
                return Err(ConfigurationError::EmptySalt);
            }
            let mut key = [0u8; KEY_LEN];
            pbkdf2::derive(
                pbkdf2::PBKDF2_HMAC_SHA256,
                *PBKDF2_ITERATIONS,
                salt.as_bytes(),
                secret.as_bytes(),
                &mut key,
            );
            Ok(key)
        }
    }
}

/// Encrypt under a fresh random IV. Returns the IV and the padded
/// ciphertext.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> ([u8; IV_LEN], Vec<u8>) {
    let mut iv = [0u8; IV_LEN];
    SYSTEM_RANDOM.fill(&mut iv).expect("cookie IV generation failed");
    let ciphertext =
        Aes256CbcEnc::new(&(*key).into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    (iv, ciphertext)
}

/// Decrypt a cookie payload. The IV must be one block and the ciphertext
/// non-empty and block-aligned.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    if iv.len() != IV_LEN {
        return Err(DecryptionError::InvalidIv);
    }
    if ciphertext.is_empty() || ciphertext.len() % IV_LEN != 0 {
        return Err(DecryptionError::Misaligned);
    }
    let mut iv_block = [0u8; IV_LEN];
    iv_block.copy_from_slice(iv);
    Aes256CbcDec::new(&(*key).into(), &iv_block.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DecryptionError::Padding)
}
