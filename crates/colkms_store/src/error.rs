//! Error types for master key store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while resolving master keys.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The identifier does not name a key in this store.
    #[error("unknown master key identifier: {id}")]
    UnknownKeyIdentifier {
        /// The identifier that was looked up.
        id: String,
    },

    /// The backing key service could not be reached or refused the request.
    #[error("master key store unavailable: {0}")]
    Unavailable(String),

    /// An I/O error occurred while reading key files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key file could not be parsed.
    #[error("invalid key file: {0}")]
    InvalidKeyFile(String),
}

impl StoreError {
    /// Creates an unknown key identifier error.
    pub fn unknown_key(id: impl Into<String>) -> Self {
        Self::UnknownKeyIdentifier { id: id.into() }
    }

    /// Returns true if this error means the key does not exist.
    #[must_use]
    pub fn is_unknown_key(&self) -> bool {
        matches!(self, Self::UnknownKeyIdentifier { .. })
    }
}
