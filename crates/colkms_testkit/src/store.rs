//! Instrumented master key stores.

use colkms_store::{InMemoryKeyStore, MasterKeyMaterial, MasterKeyStore, StoreError, StoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// A store that counts resolutions and can simulate a slow or offline KMS.
#[derive(Debug, Default)]
pub struct CountingKeyStore {
    inner: InMemoryKeyStore,
    total: AtomicUsize,
    per_key: Mutex<HashMap<String, usize>>,
    latency: Mutex<Duration>,
    offline: AtomicBool,
}

impl CountingKeyStore {
    /// Creates a store holding `keys`.
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        Self {
            inner: InMemoryKeyStore::with_keys(keys),
            ..Self::default()
        }
    }

    /// The wrapped in-memory store, for rotation and revocation.
    pub fn inner(&self) -> &InMemoryKeyStore {
        &self.inner
    }

    /// Delays every resolution by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Makes every resolution fail with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total resolutions attempted.
    pub fn resolve_count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Resolutions attempted for `identifier`.
    pub fn resolve_count_for(&self, identifier: &str) -> usize {
        self.per_key.lock().get(identifier).copied().unwrap_or(0)
    }

    /// Resets all counters.
    pub fn reset_counts(&self) {
        self.total.store(0, Ordering::SeqCst);
        self.per_key.lock().clear();
    }
}

impl MasterKeyStore for CountingKeyStore {
    fn resolve(&self, identifier: &str) -> StoreResult<MasterKeyMaterial> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.per_key.lock().entry(identifier.to_string()).or_default() += 1;

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "store offline while resolving '{identifier}'"
            )));
        }
        self.inner.resolve(identifier)
    }
}
