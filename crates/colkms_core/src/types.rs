//! Key and role types shared across colkms.

use crate::error::{KmsError, KmsResult, PlanViolation};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Bit length of a data encryption key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyLength {
    /// 128-bit key (AES-128-GCM).
    Bits128,
    /// 256-bit key (AES-256-GCM).
    Bits256,
}

impl KeyLength {
    /// Parses a bit count.
    ///
    /// # Errors
    ///
    /// Returns [`PlanViolation::UnsupportedKeyLength`] for anything other than 128 or 256.
    pub fn from_bits(bits: u32) -> Result<Self, PlanViolation> {
        match bits {
            128 => Ok(Self::Bits128),
            256 => Ok(Self::Bits256),
            other => Err(PlanViolation::UnsupportedKeyLength(other)),
        }
    }

    /// Number of bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits128 => 128,
            Self::Bits256 => 256,
        }
    }

    /// Number of bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

/// Encryption algorithm applied by the codec layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionAlgorithm {
    /// AES-GCM for all metadata and pages.
    AesGcmV1,
    /// AES-GCM for metadata, AES-CTR for data pages.
    AesGcmCtrV1,
}

impl EncryptionAlgorithm {
    /// Canonical name, as written in plan files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AesGcmV1 => "AES_GCM_V1",
            Self::AesGcmCtrV1 => "AES_GCM_CTR_V1",
        }
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EncryptionAlgorithm {
    type Err = PlanViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AES_GCM_V1" => Ok(Self::AesGcmV1),
            "AES_GCM_CTR_V1" => Ok(Self::AesGcmCtrV1),
            other => Err(PlanViolation::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// What a data key protects within one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EncryptionRole {
    /// The file footer.
    Footer,
    /// A column, by logical name.
    Column(String),
}

impl EncryptionRole {
    /// Creates a column role.
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    /// Returns true for the footer role.
    #[must_use]
    pub fn is_footer(&self) -> bool {
        matches!(self, Self::Footer)
    }

    /// Associated data binding page ciphertext to this role.
    #[must_use]
    pub fn module_aad(&self) -> Vec<u8> {
        match self {
            Self::Footer => b"footer".to_vec(),
            Self::Column(name) => {
                let mut aad = b"column:".to_vec();
                aad.extend_from_slice(name.as_bytes());
                aad
            }
        }
    }
}

impl fmt::Display for EncryptionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Footer => f.write_str("footer"),
            Self::Column(name) => write!(f, "column '{name}'"),
        }
    }
}

/// A randomly generated data encryption key (DEK).
///
/// The key is zeroized when dropped and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    bytes: Vec<u8>,
}

impl DataKey {
    /// Generates a fresh random key of the given length.
    #[must_use]
    pub fn generate(length: KeyLength) -> Self {
        let mut bytes = vec![0u8; length.bytes()];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not 16 or 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> KmsResult<Self> {
        if bytes.len() != KeyLength::Bits128.bytes() && bytes.len() != KeyLength::Bits256.bytes() {
            return Err(KmsError::InvalidKeySize {
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Returns the key bytes.
    ///
    /// # Security
    ///
    /// Don't log or persist the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of this key.
    #[must_use]
    pub fn length(&self) -> KeyLength {
        if self.bytes.len() == KeyLength::Bits256.bytes() {
            KeyLength::Bits256
        } else {
            KeyLength::Bits128
        }
    }

    /// Short, non-reversible identifier for log lines.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        short_fingerprint(&self.bytes)
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKey")
            .field("bits", &self.length().bits())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A data key wrapped under a master key.
///
/// The token is opaque to the codec layer, which persists it next to the
/// footer or column metadata.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    /// Wraps raw token bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decodes a base64 token.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::CorruptWrappedKey`] if the text is not valid base64.
    pub fn from_base64(encoded: &str) -> KmsResult<Self> {
        BASE64_STANDARD
            .decode(encoded)
            .map(Self)
            .map_err(|e| KmsError::corrupt_wrapped_key(format!("invalid base64: {e}")))
    }

    /// Encodes the token as base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.0)
    }

    /// Returns the token bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the token, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Token length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the token is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA-256 digest of the token, used as a cache key on the read path.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(&self.0).into()
    }
}

impl fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedKey")
            .field("len", &self.0.len())
            .field("fingerprint", &short_fingerprint(&self.0))
            .finish()
    }
}

pub(crate) fn short_fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_key() {
        let key1 = DataKey::generate(KeyLength::Bits128);
        let key2 = DataKey::generate(KeyLength::Bits128);

        assert_eq!(key1.as_bytes().len(), 16);
        assert_ne!(key1, key2);
        assert_eq!(DataKey::generate(KeyLength::Bits256).as_bytes().len(), 32);
    }

    #[test]
    fn key_from_bytes() {
        let key = DataKey::from_bytes(&[42u8; 32]).unwrap();
        assert_eq!(key.length(), KeyLength::Bits256);
        assert_eq!(key.as_bytes(), &[42u8; 32][..]);
    }

    #[test]
    fn key_wrong_size() {
        assert!(matches!(
            DataKey::from_bytes(&[0u8; 24]),
            Err(KmsError::InvalidKeySize { actual: 24 })
        ));
        assert!(DataKey::from_bytes(&[]).is_err());
    }

    #[test]
    fn data_key_debug_is_redacted() {
        let key = DataKey::from_bytes(&[0xAB; 16]).unwrap();
        let printed = format!("{key:?}");
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("171"));
    }

    #[test]
    fn key_length_parsing() {
        assert_eq!(KeyLength::from_bits(128).unwrap(), KeyLength::Bits128);
        assert_eq!(KeyLength::from_bits(256).unwrap().bytes(), 32);
        assert_eq!(
            KeyLength::from_bits(192),
            Err(PlanViolation::UnsupportedKeyLength(192))
        );
    }

    #[test]
    fn algorithm_names() {
        assert_eq!(
            "AES_GCM_V1".parse::<EncryptionAlgorithm>().unwrap(),
            EncryptionAlgorithm::AesGcmV1
        );
        assert_eq!(EncryptionAlgorithm::AesGcmCtrV1.to_string(), "AES_GCM_CTR_V1");
        assert!("AES_CBC".parse::<EncryptionAlgorithm>().is_err());
    }

    #[test]
    fn wrapped_key_base64() {
        let token = WrappedKey::from_bytes(vec![1, 2, 3, 250]);
        let decoded = WrappedKey::from_base64(&token.to_base64()).unwrap();
        assert_eq!(decoded, token);
        assert!(matches!(
            WrappedKey::from_base64("***"),
            Err(KmsError::CorruptWrappedKey { .. })
        ));
    }

    #[test]
    fn role_aad_differs_per_column() {
        assert_ne!(
            EncryptionRole::column("orderId").module_aad(),
            EncryptionRole::column("productId").module_aad()
        );
        assert_eq!(EncryptionRole::Footer.module_aad(), b"footer");
    }
}
