//! Error types for colkms core.

use crate::factory::OperationState;
use crate::types::EncryptionRole;
use colkms_store::StoreError;
use thiserror::Error;

/// Result type for core operations.
pub type KmsResult<T> = Result<T, KmsError>;

/// Errors that can occur in key management operations.
///
/// Every error is terminal for the operation that raised it. Nothing in
/// this crate retries; retry policy belongs to the master key store.
#[derive(Debug, Error)]
pub enum KmsError {
    /// The master key store has no key with this identifier.
    #[error("unknown master key identifier: {id}")]
    UnknownKeyIdentifier {
        /// The identifier that was looked up.
        id: String,
    },

    /// A data key could not be wrapped.
    #[error("failed to wrap data key under master key '{id}': {reason}")]
    WrapFailure {
        /// Master key identifier used for wrapping.
        id: String,
        /// Description of the failure.
        reason: String,
    },

    /// A wrapped key was produced under a different master key.
    #[error("wrapped key does not belong to master key '{expected}' (found '{found}')")]
    KeyMismatch {
        /// Identifier supplied by the caller.
        expected: String,
        /// Identifier the token claims, or a description of why it failed to authenticate.
        found: String,
    },

    /// A wrapped key could not be parsed.
    #[error("corrupt wrapped key: {reason}")]
    CorruptWrappedKey {
        /// Description of the corruption.
        reason: String,
    },

    /// An encryption plan failed validation.
    #[error("invalid encryption plan: {0}")]
    InvalidPlan(#[from] PlanViolation),

    /// A data key needed to read a file could not be recovered.
    #[error("decryption key unavailable for {role}: {source}")]
    DecryptionKeyUnavailable {
        /// The role whose key is unavailable.
        role: EncryptionRole,
        /// Why the key could not be recovered.
        #[source]
        source: Box<KmsError>,
    },

    /// No master key identifier is known for a role.
    #[error("no master key mapped for {role}")]
    NoMasterKeyForRole {
        /// The unmapped role.
        role: EncryptionRole,
    },

    /// A key operation was driven out of order.
    #[error("invalid operation state: expected {expected:?}, was {actual:?}")]
    InvalidState {
        /// State required for the transition.
        expected: OperationState,
        /// State the operation was in.
        actual: OperationState,
    },

    /// Invalid data key size.
    #[error("invalid data key size: {actual} bytes (expected 16 or 32)")]
    InvalidKeySize {
        /// Actual size in bytes.
        actual: usize,
    },

    /// Page encryption or decryption failed.
    #[error("cipher error: {message}")]
    Cipher {
        /// Description of the failure.
        message: String,
    },

    /// Persisted key metadata could not be read or written.
    #[error("invalid key metadata: {message}")]
    Metadata {
        /// Description of the problem.
        message: String,
    },

    /// A configuration or plan file could not be parsed.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The master key store failed for a reason other than an unknown key.
    #[error("master key store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for KmsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownKeyIdentifier { id } => Self::UnknownKeyIdentifier { id },
            other => Self::Store(other),
        }
    }
}

impl KmsError {
    /// Creates a wrap failure error.
    pub fn wrap_failure(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WrapFailure {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a key mismatch error.
    pub fn key_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::KeyMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a corrupt wrapped key error.
    pub fn corrupt_wrapped_key(reason: impl Into<String>) -> Self {
        Self::CorruptWrappedKey {
            reason: reason.into(),
        }
    }

    /// Creates a decryption key unavailable error for `role`.
    pub fn decryption_key_unavailable(role: EncryptionRole, source: KmsError) -> Self {
        Self::DecryptionKeyUnavailable {
            role,
            source: Box::new(source),
        }
    }

    /// Creates a cipher error.
    pub fn cipher(message: impl Into<String>) -> Self {
        Self::Cipher {
            message: message.into(),
        }
    }

    /// Creates a key metadata error.
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns the innermost error, looking through
    /// [`DecryptionKeyUnavailable`](Self::DecryptionKeyUnavailable).
    #[must_use]
    pub fn root_cause(&self) -> &KmsError {
        match self {
            Self::DecryptionKeyUnavailable { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A specific reason an [`EncryptionPlan`](crate::EncryptionPlan) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanViolation {
    /// A column key names a column the schema does not have.
    #[error("column '{column}' mapped to master key '{master_key_id}' is not in the schema")]
    UnknownColumn {
        /// The missing column.
        column: String,
        /// The master key it was mapped to.
        master_key_id: String,
    },

    /// A column is mapped to more than one master key.
    #[error("column '{column}' is mapped to both '{first}' and '{second}'")]
    ConflictingColumnKeys {
        /// The column.
        column: String,
        /// First master key.
        first: String,
        /// Second master key.
        second: String,
    },

    /// The algorithm name is not supported.
    #[error("unsupported encryption algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    /// The data key length is not 128 or 256 bits.
    #[error("unsupported data key length {0} bits (expected 128 or 256)")]
    UnsupportedKeyLength(u32),

    /// A master key identifier is empty.
    #[error("master key identifier must not be empty")]
    EmptyMasterKeyId,

    /// An encrypted footer was requested without a footer key.
    #[error("encrypted footer requires a footer key")]
    MissingFooterKey,

    /// A column the schema marks as sensitive has no key.
    #[error("column '{column}' requires encryption but has no master key")]
    UnmappedSensitiveColumn {
        /// The unmapped column.
        column: String,
    },

    /// A uniform plan also maps columns to their own keys.
    #[error("uniform encryption does not take column keys")]
    UniformWithColumnKeys,

    /// The plan encrypts nothing.
    #[error("plan has no footer key and no column keys")]
    EmptyPlan,

    /// The cache lifetime is zero.
    #[error("cache lifetime must be greater than zero")]
    ZeroCacheLifetime,
}
