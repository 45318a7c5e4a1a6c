//! Master key store trait definition.

use crate::error::StoreResult;
use crate::material::MasterKeyMaterial;
use std::sync::Arc;

/// A source of master key material.
///
/// Stores are **opaque secret lookups**. They may be a local map, a key file,
/// or a client for a remote key management service. colkms owns all key
/// wrapping; stores only hand out material for an identifier.
///
/// # Invariants
///
/// - `resolve` returns the same material for the same identifier until the
///   key is rotated or removed
/// - Unknown identifiers fail with [`StoreError::UnknownKeyIdentifier`]
/// - Stores must be `Send + Sync`; `resolve` may be called concurrently
///
/// Remote stores may block or fail transiently. colkms never retries a
/// failed `resolve`; retry policy belongs to the store implementation.
///
/// [`StoreError::UnknownKeyIdentifier`]: crate::StoreError::UnknownKeyIdentifier
///
/// # Implementors
///
/// - [`super::InMemoryKeyStore`]
/// - [`super::FileKeyStore`]
pub trait MasterKeyStore: Send + Sync {
    /// Resolves a master key identifier to its material.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The identifier is not known to the store
    /// - The backing service is unavailable
    fn resolve(&self, identifier: &str) -> StoreResult<MasterKeyMaterial>;

    /// Returns true if the store can resolve `identifier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing service is unavailable.
    fn contains(&self, identifier: &str) -> StoreResult<bool> {
        match self.resolve(identifier) {
            Ok(_) => Ok(true),
            Err(err) if err.is_unknown_key() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl<T: MasterKeyStore + ?Sized> MasterKeyStore for Arc<T> {
    fn resolve(&self, identifier: &str) -> StoreResult<MasterKeyMaterial> {
        (**self).resolve(identifier)
    }

    fn contains(&self, identifier: &str) -> StoreResult<bool> {
        (**self).contains(identifier)
    }
}
