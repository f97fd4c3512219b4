//! Provider-credential encryption.
//!
//! Raw token JSON is sealed with AES-256-GCM under the process-wide 32-byte
//! key. Storage layout is `nonce ‖ ciphertext` verbatim, with a fresh random
//! 12-byte nonce per seal.

use crate::error::{DriveError, DriveResult};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Process-wide symmetric cipher for provider credentials.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Build from the decoded 32-byte key.
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new((&key).into()),
        }
    }

    /// Encrypt plaintext; returns `nonce ‖ ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> DriveResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| DriveError::Credential(format!("encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt `nonce ‖ ciphertext` produced by [`seal`](Self::seal).
    pub fn open(&self, data: &[u8]) -> DriveResult<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(DriveError::Credential("ciphertext too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| DriveError::Credential(format!("decryption failed: {e}")))
    }
}
