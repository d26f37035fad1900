//! Symmetric text encryption for secrets at rest
//!
//! - **Key derivation**: PBKDF2-HMAC-SHA256 (100 000 iterations) over the
//!   configured password and hex salt
//! - **Encryption**: AES-256-GCM with a random 96-bit nonce per value
//! - **Stored format**: hex of `nonce || ciphertext`

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::CacheError;

/// PBKDF2 iteration count.
const PBKDF2_ITERATIONS: u32 = 100_000;

/// AES-256-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Derived key length in bytes (256-bit for AES-256).
const KEY_LEN: usize = 32;

/// Encrypts and decrypts short text values with a password-derived key
#[derive(Clone)]
pub struct TextEncryptor {
    cipher: Aes256Gcm,
}

impl TextEncryptor {
    /// Derives the key from `password` and the hex-encoded `salt`
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Crypto` if the password is empty or the salt is
    /// not valid hex.
    pub fn new(password: &str, salt_hex: &str) -> Result<Self, CacheError> {
        if password.is_empty() {
            return Err(CacheError::Crypto("Encryption password is empty".into()));
        }
        let salt = hex::decode(salt_hex)
            .map_err(|e| CacheError::Crypto(format!("Bad salt hex: {}", e)))?;

        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<sha2::Sha256>(
            password.as_bytes(),
            &salt,
            PBKDF2_ITERATIONS,
            &mut key,
        );
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CacheError::Crypto(format!("AES init: {}", e)))?;
        Ok(Self { cipher })
    }

    /// Encrypts `plaintext`, returning hex of `nonce || ciphertext`
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CacheError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| CacheError::Crypto(format!("AES encrypt: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    /// Decrypts a value produced by [`encrypt`](Self::encrypt)
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Crypto` on malformed input or when the key does
    /// not match the one used to encrypt.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CacheError> {
        let bytes = hex::decode(encoded)
            .map_err(|e| CacheError::Crypto(format!("Bad ciphertext hex: {}", e)))?;
        if bytes.len() <= NONCE_LEN {
            return Err(CacheError::Crypto(format!(
                "Ciphertext too short: {} bytes",
                bytes.len()
            )));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                CacheError::Crypto("Decryption failed: wrong key or corrupted data".into())
            })?;
        String::from_utf8(plaintext).map_err(|e| CacheError::Crypto(format!("UTF-8 decode: {}", e)))
    }
}

impl fmt::Debug for TextEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextEncryptor").finish_non_exhaustive()
    }
}
