//! Raw master key material.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret bytes of a master key.
///
/// Material of any non-empty length is accepted; consumers derive the
/// key-encryption key they need from it. The bytes are zeroized on drop
/// and never appear in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKeyMaterial {
    bytes: Vec<u8>,
}

impl MasterKeyMaterial {
    /// Wraps raw secret bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Creates material from a text secret, using its UTF-8 bytes.
    #[must_use]
    pub fn from_text(secret: &str) -> Self {
        Self::new(secret.as_bytes().to_vec())
    }

    /// Returns the secret bytes.
    ///
    /// # Security
    ///
    /// Don't log or persist the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the material in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the material holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for MasterKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKeyMaterial")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let material = MasterKeyMaterial::from_text("column_secret001");
        let printed = format!("{material:?}");
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("column_secret001"));
    }

    #[test]
    fn text_material_uses_utf8_bytes() {
        let material = MasterKeyMaterial::from_text("012footer_secret");
        assert_eq!(material.as_bytes(), b"012footer_secret");
        assert_eq!(material.len(), 16);
        assert!(!material.is_empty());
    }
}
