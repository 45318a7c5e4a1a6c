//! In-memory master key store.

use crate::error::{StoreError, StoreResult};
use crate::material::MasterKeyMaterial;
use crate::store::MasterKeyStore;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A master key store backed by a map in memory.
///
/// This store is suitable for:
/// - Unit and integration tests
/// - Keys configured locally by the application
/// - Rotation drills (`insert` over an existing id, `remove` to revoke)
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use colkms_store::{InMemoryKeyStore, MasterKeyStore};
///
/// let store = InMemoryKeyStore::with_keys([("kf", b"0123456789012345".to_vec())]);
/// assert!(store.contains("kf").unwrap());
/// assert!(!store.contains("missing").unwrap());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<String, MasterKeyMaterial>>,
}

impl InMemoryKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given identifier/material pairs.
    #[must_use]
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(|(id, bytes)| (id.into(), MasterKeyMaterial::new(bytes)))
            .collect();
        Self {
            keys: RwLock::new(keys),
        }
    }

    /// Adds or replaces a master key.
    ///
    /// Replacing an existing identifier is a rotation: tokens wrapped under
    /// the old material no longer authenticate.
    pub fn insert(&self, id: impl Into<String>, bytes: Vec<u8>) {
        self.keys
            .write()
            .insert(id.into(), MasterKeyMaterial::new(bytes));
    }

    /// Removes a master key, returning true if it was present.
    pub fn remove(&self, id: &str) -> bool {
        self.keys.write().remove(id).is_some()
    }

    /// Number of keys in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Returns true if the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Returns the identifiers of all keys, sorted.
    #[must_use]
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl MasterKeyStore for InMemoryKeyStore {
    fn resolve(&self, identifier: &str) -> StoreResult<MasterKeyMaterial> {
        self.keys
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| StoreError::unknown_key(identifier))
    }

    fn contains(&self, identifier: &str) -> StoreResult<bool> {
        Ok(self.keys.read().contains_key(identifier))
    }
}
