//! Authenticated wrapped-key token format.
//!
//! A token is laid out as:
//!
//! ```text
//! version (1) || id_len (u16 BE) || master key id (id_len) || nonce (12) || ciphertext || tag (16)
//! ```
//!
//! The key-encryption key is derived from the master key material with
//! HKDF-SHA256, so master keys of any length are accepted. The header
//! (version, length and identifier) is the AEAD associated data, so a token
//! only opens under the master key identity it names.

use crate::error::{KmsError, KmsResult};
use crate::types::{DataKey, KeyLength, WrappedKey};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use colkms_store::MasterKeyMaterial;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Current token format version.
pub const WRAP_FORMAT_VERSION: u8 = 1;
/// Size of the wrap nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

const KEK_SIZE: usize = 32;
const KEK_SALT: &[u8] = b"colkms-key-encryption-key-v1";
const FIXED_HEADER: usize = 3;

/// A token split into its fields. Nothing here has been authenticated yet.
#[derive(Debug)]
pub(crate) struct ParsedToken<'a> {
    pub header: &'a [u8],
    pub master_key_id: &'a str,
    pub nonce: &'a [u8],
    pub sealed: &'a [u8],
}

/// Splits a token into header, identifier, nonce and sealed key.
pub(crate) fn parse(token: &[u8]) -> KmsResult<ParsedToken<'_>> {
    if token.len() < FIXED_HEADER {
        return Err(KmsError::corrupt_wrapped_key(format!(
            "token is {} bytes, shorter than its header",
            token.len()
        )));
    }
    if token[0] != WRAP_FORMAT_VERSION {
        return Err(KmsError::corrupt_wrapped_key(format!(
            "unsupported token version {}",
            token[0]
        )));
    }

    let id_len = u16::from_be_bytes([token[1], token[2]]) as usize;
    let header_len = FIXED_HEADER + id_len;
    let min_sealed = KeyLength::Bits128.bytes() + TAG_SIZE;
    if token.len() < header_len + NONCE_SIZE + min_sealed {
        return Err(KmsError::corrupt_wrapped_key(format!(
            "token is {} bytes, too short for a {id_len}-byte identifier",
            token.len()
        )));
    }

    let sealed_len = token.len() - header_len - NONCE_SIZE;
    if sealed_len != KeyLength::Bits128.bytes() + TAG_SIZE
        && sealed_len != KeyLength::Bits256.bytes() + TAG_SIZE
    {
        return Err(KmsError::corrupt_wrapped_key(format!(
            "sealed key is {sealed_len} bytes"
        )));
    }

    let master_key_id = std::str::from_utf8(&token[FIXED_HEADER..header_len])
        .map_err(|_| KmsError::corrupt_wrapped_key("master key identifier is not UTF-8"))?;

    Ok(ParsedToken {
        header: &token[..header_len],
        master_key_id,
        nonce: &token[header_len..header_len + NONCE_SIZE],
        sealed: &token[header_len + NONCE_SIZE..],
    })
}

/// Returns the master key identifier a token claims, without authenticating it.
///
/// # Errors
///
/// Returns [`KmsError::CorruptWrappedKey`] if the token cannot be parsed.
pub fn embedded_master_key_id(token: &WrappedKey) -> KmsResult<String> {
    parse(token.as_bytes()).map(|parsed| parsed.master_key_id.to_string())
}

/// Seals `dek` under the master key `master_key_id`.
pub(crate) fn seal(
    dek: &DataKey,
    master_key_id: &str,
    material: &MasterKeyMaterial,
) -> KmsResult<WrappedKey> {
    let id_len = u16::try_from(master_key_id.len()).map_err(|_| {
        KmsError::wrap_failure(master_key_id, "master key identifier longer than 65535 bytes")
    })?;

    let mut header = Vec::with_capacity(FIXED_HEADER + master_key_id.len());
    header.push(WRAP_FORMAT_VERSION);
    header.extend_from_slice(&id_len.to_be_bytes());
    header.extend_from_slice(master_key_id.as_bytes());

    let cipher = key_encryption_cipher(master_key_id, material)
        .map_err(|e| KmsError::wrap_failure(master_key_id, e))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(
            nonce,
            Payload {
                msg: dek.as_bytes(),
                aad: &header,
            },
        )
        .map_err(|_| KmsError::wrap_failure(master_key_id, "AEAD encryption failed"))?;

    let mut token = header;
    token.reserve(NONCE_SIZE + sealed.len());
    token.extend_from_slice(&nonce_bytes);
    token.extend(sealed);
    Ok(WrappedKey::from_bytes(token))
}

/// Opens a token that was sealed under `expected_id`.
pub(crate) fn open(
    token: &ParsedToken<'_>,
    expected_id: &str,
    material: &MasterKeyMaterial,
) -> KmsResult<DataKey> {
    if token.master_key_id != expected_id {
        return Err(KmsError::key_mismatch(expected_id, token.master_key_id));
    }

    let cipher = key_encryption_cipher(expected_id, material).map_err(KmsError::cipher)?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(token.nonce),
                Payload {
                    msg: token.sealed,
                    aad: token.header,
                },
            )
            .map_err(|_| {
                KmsError::key_mismatch(expected_id, "token does not authenticate under this key")
            })?,
    );

    DataKey::from_bytes(&plaintext)
}

fn key_encryption_cipher(
    master_key_id: &str,
    material: &MasterKeyMaterial,
) -> Result<Aes256Gcm, String> {
    if material.is_empty() {
        return Err("master key material is empty".to_string());
    }

    let hk = Hkdf::<Sha256>::new(Some(KEK_SALT), material.as_bytes());
    let mut kek = Zeroizing::new([0u8; KEK_SIZE]);
    hk.expand(master_key_id.as_bytes(), &mut kek[..])
        .map_err(|_| "HKDF expand failed".to_string())?;

    Aes256Gcm::new_from_slice(&kek[..]).map_err(|_| "invalid key-encryption key".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> MasterKeyMaterial {
        MasterKeyMaterial::from_text("012footer_secret")
    }

    #[test]
    fn seal_open_roundtrip() {
        let dek = DataKey::generate(KeyLength::Bits128);
        let token = seal(&dek, "footer_key", &material()).unwrap();
        let parsed = parse(token.as_bytes()).unwrap();

        assert_eq!(parsed.master_key_id, "footer_key");
        assert_eq!(open(&parsed, "footer_key", &material()).unwrap(), dek);
    }

    #[test]
    fn seal_is_not_deterministic() {
        let dek = DataKey::generate(KeyLength::Bits256);
        let t1 = seal(&dek, "k", &material()).unwrap();
        let t2 = seal(&dek, "k", &material()).unwrap();
        assert_ne!(t1, t2);
    }

    #[test]
    fn token_length_matches_layout() {
        let dek = DataKey::generate(KeyLength::Bits128);
        let token = seal(&dek, "kf", &material()).unwrap();
        assert_eq!(token.len(), FIXED_HEADER + 2 + NONCE_SIZE + 16 + TAG_SIZE);
    }

    #[test]
    fn master_keys_of_any_length_work() {
        let dek = DataKey::generate(KeyLength::Bits128);
        for len in [1usize, 7, 16, 33, 100] {
            let material = MasterKeyMaterial::new(vec![9u8; len]);
            let token = seal(&dek, "k", &material).unwrap();
            let parsed = parse(token.as_bytes()).unwrap();
            assert_eq!(open(&parsed, "k", &material).unwrap(), dek);
        }
    }

    #[test]
    fn wrong_identifier_is_mismatch() {
        let dek = DataKey::generate(KeyLength::Bits128);
        let token = seal(&dek, "k1", &material()).unwrap();
        let parsed = parse(token.as_bytes()).unwrap();
        assert!(matches!(
            open(&parsed, "k2", &material()),
            Err(KmsError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn wrong_material_is_mismatch() {
        let dek = DataKey::generate(KeyLength::Bits128);
        let token = seal(&dek, "k", &material()).unwrap();
        let parsed = parse(token.as_bytes()).unwrap();
        let other = MasterKeyMaterial::from_text("another_secret!!");
        assert!(matches!(
            open(&parsed, "k", &other),
            Err(KmsError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn truncated_token_is_corrupt() {
        let dek = DataKey::generate(KeyLength::Bits128);
        let token = seal(&dek, "k", &material()).unwrap();
        let bytes = token.as_bytes();

        for len in [0, 2, 5, bytes.len() - 1] {
            assert!(matches!(
                parse(&bytes[..len]),
                Err(KmsError::CorruptWrappedKey { .. })
            ));
        }
    }

    #[test]
    fn unknown_version_is_corrupt() {
        let dek = DataKey::generate(KeyLength::Bits128);
        let mut bytes = seal(&dek, "k", &material()).unwrap().into_bytes();
        bytes[0] = 9;
        assert!(matches!(parse(&bytes), Err(KmsError::CorruptWrappedKey { .. })));
    }

    #[test]
    fn inflated_id_length_is_corrupt() {
        let dek = DataKey::generate(KeyLength::Bits128);
        let mut bytes = seal(&dek, "k", &material()).unwrap().into_bytes();
        bytes[1] = 0xFF;
        assert!(matches!(parse(&bytes), Err(KmsError::CorruptWrappedKey { .. })));
    }

    #[test]
    fn embedded_id_is_readable() {
        let dek = DataKey::generate(KeyLength::Bits128);
        let token = seal(&dek, "orderid_key", &material()).unwrap();
        assert_eq!(embedded_master_key_id(&token).unwrap(), "orderid_key");
    }
}
