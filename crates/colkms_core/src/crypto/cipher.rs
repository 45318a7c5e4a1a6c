//! AES-GCM page encryption with a data key.

use super::wrap::{NONCE_SIZE, TAG_SIZE};
use crate::error::{KmsError, KmsResult};
use crate::types::{DataKey, KeyLength};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::RngCore;

enum Inner {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

/// Encrypts and decrypts footer and page buffers with one data key.
///
/// 128-bit keys use AES-128-GCM, 256-bit keys use AES-256-GCM.
/// The output format is: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
///
/// This is the operation the codec layer performs with the keys handed out
/// by [`FileEncryptionContext`](crate::FileEncryptionContext) and
/// [`FileDecryptionContext`](crate::FileDecryptionContext).
pub struct PageCipher {
    inner: Inner,
}

impl PageCipher {
    /// Creates a cipher for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot initialise the cipher.
    pub fn new(key: &DataKey) -> KmsResult<Self> {
        let inner = match key.length() {
            KeyLength::Bits128 => Aes128Gcm::new_from_slice(key.as_bytes()).map(Inner::Aes128),
            KeyLength::Bits256 => Aes256Gcm::new_from_slice(key.as_bytes()).map(Inner::Aes256),
        }
        .map_err(|_| KmsError::cipher("invalid data key for AES-GCM"))?;
        Ok(Self { inner })
    }

    /// Encrypts `plaintext`, authenticating `aad` alongside it.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> KmsResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let payload = Payload {
            msg: plaintext,
            aad,
        };

        let ciphertext = match &self.inner {
            Inner::Aes128(cipher) => cipher.encrypt(nonce, payload),
            Inner::Aes256(cipher) => cipher.encrypt(nonce, payload),
        }
        .map_err(|_| KmsError::cipher("encryption error"))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);
        Ok(result)
    }

    /// Decrypts data produced by [`encrypt`](Self::encrypt) with the same `aad`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is too short, was encrypted with another
    /// key, or was modified.
    pub fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> KmsResult<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(KmsError::cipher("ciphertext too short"));
        }

        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
        let payload = Payload {
            msg: &ciphertext[NONCE_SIZE..],
            aad,
        };

        match &self.inner {
            Inner::Aes128(cipher) => cipher.decrypt(nonce, payload),
            Inner::Aes256(cipher) => cipher.decrypt(nonce, payload),
        }
        .map_err(|_| KmsError::cipher("decryption error"))
    }
}

impl std::fmt::Debug for PageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cipher = match self.inner {
            Inner::Aes128(_) => "Aes128Gcm",
            Inner::Aes256(_) => "Aes256Gcm",
        };
        f.debug_struct("PageCipher").field("cipher", &cipher).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        for length in [KeyLength::Bits128, KeyLength::Bits256] {
            let cipher = PageCipher::new(&DataKey::generate(length)).unwrap();
            let plaintext = b"1001,1002,1003";
            let ciphertext = cipher.encrypt(plaintext, b"column:orderId").unwrap();

            assert_ne!(&ciphertext[NONCE_SIZE..NONCE_SIZE + plaintext.len()], plaintext);
            assert_eq!(
                cipher.decrypt(&ciphertext, b"column:orderId").unwrap(),
                plaintext
            );
        }
    }

    #[test]
    fn decrypt_wrong_key_fails() {
        let c1 = PageCipher::new(&DataKey::generate(KeyLength::Bits128)).unwrap();
        let c2 = PageCipher::new(&DataKey::generate(KeyLength::Bits128)).unwrap();
        let ciphertext = c1.encrypt(b"secret", b"").unwrap();
        assert!(c2.decrypt(&ciphertext, b"").is_err());
    }

    #[test]
    fn wrong_aad_fails() {
        let cipher = PageCipher::new(&DataKey::generate(KeyLength::Bits256)).unwrap();
        let ciphertext = cipher.encrypt(b"secret", b"footer").unwrap();
        assert!(cipher.decrypt(&ciphertext, b"column:vat").is_err());
    }

    #[test]
    fn decrypt_too_short_fails() {
        let cipher = PageCipher::new(&DataKey::generate(KeyLength::Bits128)).unwrap();
        assert!(cipher.decrypt(&[0u8; 10], b"").is_err());
    }

    #[test]
    fn empty_plaintext() {
        let cipher = PageCipher::new(&DataKey::generate(KeyLength::Bits128)).unwrap();
        let ciphertext = cipher.encrypt(b"", b"footer").unwrap();
        assert_eq!(ciphertext.len(), NONCE_SIZE + TAG_SIZE);
        assert!(cipher.decrypt(&ciphertext, b"footer").unwrap().is_empty());
    }
}
