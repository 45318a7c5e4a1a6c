//! Factory configuration.

use crate::cache::DEFAULT_CACHE_LIFETIME;
use crate::types::{EncryptionAlgorithm, KeyLength};
use std::time::Duration;

/// Defaults applied to every plan built through a
/// [`CryptoFactory`](crate::CryptoFactory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmsConfig {
    /// How long generated and unwrapped keys stay cached.
    pub cache_lifetime: Duration,

    /// Length of generated data keys.
    pub data_key_length: KeyLength,

    /// Algorithm the codec layer applies with the data keys.
    pub algorithm: EncryptionAlgorithm,

    /// Whether the footer is left in plaintext.
    pub plaintext_footer: bool,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            cache_lifetime: DEFAULT_CACHE_LIFETIME, // 2 minutes
            data_key_length: KeyLength::Bits128,
            algorithm: EncryptionAlgorithm::AesGcmV1,
            plaintext_footer: false,
        }
    }
}

impl KmsConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache lifetime.
    #[must_use]
    pub const fn cache_lifetime(mut self, lifetime: Duration) -> Self {
        self.cache_lifetime = lifetime;
        self
    }

    /// Sets the data key length.
    #[must_use]
    pub const fn data_key_length(mut self, length: KeyLength) -> Self {
        self.data_key_length = length;
        self
    }

    /// Sets the encryption algorithm.
    #[must_use]
    pub const fn algorithm(mut self, algorithm: EncryptionAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets whether the footer is left in plaintext.
    #[must_use]
    pub const fn plaintext_footer(mut self, value: bool) -> Self {
        self.plaintext_footer = value;
        self
    }
}
