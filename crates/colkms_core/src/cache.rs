//! Time-bounded cache of data keys and their wrapped forms.
//!
//! The cache sits between the [`CryptoFactory`](crate::CryptoFactory) and the
//! master key store. Each key has its own slot lock: callers racing on the
//! same key wait for the first caller's generator instead of running their
//! own, while callers on different keys proceed in parallel. The map lock is
//! only held long enough to find or create a slot.
//!
//! Entries are purged lazily. An expired entry is replaced the next time its
//! key is requested; [`KeyCache::purge_expired`] sweeps the whole map.

use crate::error::{KmsError, KmsResult};
use crate::types::{DataKey, EncryptionRole, KeyLength, WrappedKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default lifetime of cache entries.
pub const DEFAULT_CACHE_LIFETIME: Duration = Duration::from_secs(120);

/// Identifies a cached data key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A freshly generated key for a role on the write path.
    Wrap {
        /// The role the key protects.
        role: EncryptionRole,
        /// Master key the data key is wrapped under.
        master_key_id: String,
        /// Length of the generated key.
        length: KeyLength,
    },
    /// An unwrapped key on the read path.
    Unwrap {
        /// Master key the token was unwrapped with.
        master_key_id: String,
        /// SHA-256 digest of the wrapped token.
        digest: [u8; 32],
    },
}

impl CacheKey {
    /// Key for a generated data key.
    pub fn wrap(role: EncryptionRole, master_key_id: impl Into<String>, length: KeyLength) -> Self {
        Self::Wrap {
            role,
            master_key_id: master_key_id.into(),
            length,
        }
    }

    /// Key for an unwrapped token.
    pub fn unwrap(master_key_id: impl Into<String>, wrapped: &WrappedKey) -> Self {
        Self::Unwrap {
            master_key_id: master_key_id.into(),
            digest: wrapped.digest(),
        }
    }

    /// The master key this entry depends on.
    #[must_use]
    pub fn master_key_id(&self) -> &str {
        match self {
            Self::Wrap { master_key_id, .. } | Self::Unwrap { master_key_id, .. } => master_key_id,
        }
    }
}

/// A data key together with its wrapped form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedKey {
    dek: DataKey,
    wrapped: WrappedKey,
}

impl CachedKey {
    /// Pairs a data key with its wrapped token.
    #[must_use]
    pub fn new(dek: DataKey, wrapped: WrappedKey) -> Self {
        Self { dek, wrapped }
    }

    /// The data key.
    #[must_use]
    pub fn dek(&self) -> &DataKey {
        &self.dek
    }

    /// The wrapped token.
    #[must_use]
    pub fn wrapped(&self) -> &WrappedKey {
        &self.wrapped
    }

    /// Splits into data key and token.
    #[must_use]
    pub fn into_parts(self) -> (DataKey, WrappedKey) {
        (self.dek, self.wrapped)
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedKey,
    inserted_at: Instant,
}

impl CacheEntry {
    fn new(value: CachedKey) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    fn is_valid(&self, lifetime: Duration) -> bool {
        Instant::now().saturating_duration_since(self.inserted_at) < lifetime
    }
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Counters describing cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served from a live entry.
    pub hits: u64,
    /// Requests that ran the generator.
    pub misses: u64,
    /// Expired entries dropped.
    pub expirations: u64,
    /// Entries removed by [`KeyCache::invalidate`].
    pub invalidations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
}

/// A cache of data keys keyed by role or wrapped token.
///
/// # Guarantees
///
/// - A live entry is never older than the lifetime it is requested with
/// - For one key, the generator runs at most once per lifetime window;
///   concurrent callers block on the slot and receive the same result
/// - A failing generator leaves nothing behind
pub struct KeyCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    lifetime: Duration,
    counters: Counters,
}

impl KeyCache {
    /// Creates a cache whose entries live for `lifetime`.
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            lifetime,
            counters: Counters::default(),
        }
    }

    /// The default entry lifetime for this cache.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Returns the cached `length` key for `(role, master_key_id)`, running
    /// `generator` to create it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the generator's error, or [`KmsError::InvalidKeySize`] if it
    /// produced a key of another length. Nothing is cached in either case.
    pub fn get_or_create<F>(
        &self,
        role: &EncryptionRole,
        master_key_id: &str,
        length: KeyLength,
        generator: F,
    ) -> KmsResult<CachedKey>
    where
        F: FnOnce() -> KmsResult<CachedKey>,
    {
        let key = CacheKey::wrap(role.clone(), master_key_id, length);
        self.get_or_create_with(key, self.lifetime, generator)
    }

    /// Returns the live entry for `key`, or runs `generator` and caches its
    /// result for `lifetime`.
    ///
    /// # Errors
    ///
    /// Returns the generator's error. For [`CacheKey::Wrap`] keys, a
    /// generated key whose length differs from the key's length fails with
    /// [`KmsError::InvalidKeySize`]. Nothing is cached in either case.
    pub fn get_or_create_with<F>(
        &self,
        key: CacheKey,
        lifetime: Duration,
        generator: F,
    ) -> KmsResult<CachedKey>
    where
        F: FnOnce() -> KmsResult<CachedKey>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut entry = slot.lock();
        if let Some(existing) = entry.as_ref() {
            if existing.is_valid(lifetime) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(master_key_id = key.master_key_id(), "key cache hit");
                return Ok(existing.value.clone());
            }
            *entry = None;
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(master_key_id = key.master_key_id(), "key cache entry expired");
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(master_key_id = key.master_key_id(), "key cache miss");
        let value = generator()?;
        if let CacheKey::Wrap { length, .. } = &key {
            if value.dek().length() != *length {
                return Err(KmsError::InvalidKeySize {
                    actual: value.dek().as_bytes().len(),
                });
            }
        }
        *entry = Some(CacheEntry::new(value.clone()));
        Ok(value)
    }

    /// Removes every entry that depends on `master_key_id`.
    ///
    /// Used when a master key is rotated or revoked. Returns the number of
    /// entries removed. A generator already running for that key still
    /// returns its result to its callers, but the result is not reachable
    /// through the cache afterwards.
    pub fn invalidate(&self, master_key_id: &str) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|key, _| key.master_key_id() != master_key_id);
        let removed = before - slots.len();

        self.counters
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        tracing::info!(master_key_id, removed, "invalidated cached keys");
        removed
    }

    /// Drops every entry older than the cache lifetime, along with empty
    /// slots left by failed generators. Slots a caller has looked up but not
    /// yet released are left alone. Returns the number of slots removed.
    pub fn purge_expired(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        let lifetime = self.lifetime;
        let mut expired = 0u64;

        slots.retain(|_, slot| {
            // Callers clone a slot only under the map lock, so a count above
            // one means someone may still generate into it.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Some(entry) => match entry.as_ref() {
                    Some(cached) if cached.is_valid(lifetime) => true,
                    Some(_) => {
                        expired += 1;
                        false
                    }
                    None => false,
                },
                None => true,
            }
        });

        self.counters
            .expirations
            .fetch_add(expired, Ordering::Relaxed);
        before - slots.len()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Number of resident slots, including expired entries not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns true if no slots are resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Snapshot of the activity counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_LIFETIME)
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("lifetime", &self.lifetime)
            .field("slots", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KmsError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    fn fresh() -> KmsResult<CachedKey> {
        let dek = DataKey::generate(KeyLength::Bits128);
        let wrapped = WrappedKey::from_bytes(dek.as_bytes().to_vec());
        Ok(CachedKey::new(dek, wrapped))
    }

    #[test]
    fn hit_returns_same_key() {
        let cache = KeyCache::default();
        let role = EncryptionRole::Footer;

        let first = cache.get_or_create(&role, "K1", KeyLength::Bits128, fresh).unwrap();
        let second = cache
            .get_or_create(&role, "K1", KeyLength::Bits128, || {
                panic!("generator must not run on a hit")
            })
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn distinct_keys_generate_separately() {
        let cache = KeyCache::default();
        let a = cache
            .get_or_create(&EncryptionRole::Footer, "K1", KeyLength::Bits128, fresh)
            .unwrap();
        let b = cache
            .get_or_create(&EncryptionRole::column("orderId"), "K1", KeyLength::Bits128, fresh)
            .unwrap();
        let c = cache
            .get_or_create(&EncryptionRole::Footer, "K2", KeyLength::Bits128, fresh)
            .unwrap();

        assert_ne!(a.dek(), b.dek());
        assert_ne!(a.dek(), c.dek());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn expired_entry_is_regenerated() {
        let cache = KeyCache::new(Duration::from_millis(20));
        let role = EncryptionRole::column("orderId");

        let first = cache.get_or_create(&role, "K2", KeyLength::Bits128, fresh).unwrap();
        thread::sleep(Duration::from_millis(40));
        let second = cache.get_or_create(&role, "K2", KeyLength::Bits128, fresh).unwrap();

        assert_ne!(first.dek(), second.dek());
        assert_eq!(cache.stats().expirations, 1);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn failed_generator_commits_nothing() {
        let cache = KeyCache::default();
        let role = EncryptionRole::Footer;

        let err = cache
            .get_or_create(&role, "K1", KeyLength::Bits128, || {
                Err(KmsError::wrap_failure("K1", "offline"))
            })
            .unwrap_err();
        assert!(matches!(err, KmsError::WrapFailure { .. }));

        let calls = AtomicUsize::new(0);
        cache
            .get_or_create(&role, "K1", KeyLength::Bits128, || {
                calls.fetch_add(1, Ordering::SeqCst);
                fresh()
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_requests_generate_once() {
        let cache = Arc::new(KeyCache::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_create(&EncryptionRole::Footer, "K1", KeyLength::Bits128, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            fresh()
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<CachedKey> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn invalidate_removes_only_matching_master_key() {
        let cache = KeyCache::default();
        cache.get_or_create(&EncryptionRole::Footer, "K1", KeyLength::Bits128, fresh).unwrap();
        cache
            .get_or_create(&EncryptionRole::column("orderId"), "K2", KeyLength::Bits128, fresh)
            .unwrap();
        let token = WrappedKey::from_bytes(vec![1, 2, 3]);
        cache
            .get_or_create_with(CacheKey::unwrap("K1", &token), cache.lifetime(), fresh)
            .unwrap();

        assert_eq!(cache.invalidate("K1"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().invalidations, 2);
    }

    #[test]
    fn invalidated_key_is_regenerated() {
        let cache = KeyCache::default();
        let first = cache
            .get_or_create(&EncryptionRole::Footer, "K1", KeyLength::Bits128, fresh)
            .unwrap();
        cache.invalidate("K1");
        let second = cache
            .get_or_create(&EncryptionRole::Footer, "K1", KeyLength::Bits128, fresh)
            .unwrap();
        assert_ne!(first.dek(), second.dek());
    }

    #[test]
    fn purge_drops_expired_and_failed_slots() {
        let cache = KeyCache::new(Duration::from_millis(20));
        cache.get_or_create(&EncryptionRole::Footer, "K1", KeyLength::Bits128, fresh).unwrap();
        let _ = cache.get_or_create(&EncryptionRole::Footer, "K2", KeyLength::Bits128, || {
            Err(KmsError::wrap_failure("K2", "offline"))
        });
        assert_eq!(cache.len(), 2);

        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.purge_expired(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn per_call_lifetime_is_respected() {
        let cache = KeyCache::default();
        let key = CacheKey::wrap(EncryptionRole::Footer, "K1", KeyLength::Bits128);

        let first = cache
            .get_or_create_with(key.clone(), Duration::from_millis(10), fresh)
            .unwrap();
        thread::sleep(Duration::from_millis(25));
        let second = cache
            .get_or_create_with(key, Duration::from_millis(10), fresh)
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn generated_key_must_match_requested_length() {
        let cache = KeyCache::default();
        let err = cache
            .get_or_create(&EncryptionRole::Footer, "K1", KeyLength::Bits256, fresh)
            .unwrap_err();
        assert!(matches!(err, KmsError::InvalidKeySize { actual: 16 }));
        assert_eq!(cache.stats().misses, 1);

        let short = cache
            .get_or_create(&EncryptionRole::Footer, "K1", KeyLength::Bits128, fresh)
            .unwrap();
        let long = cache
            .get_or_create(&EncryptionRole::Footer, "K1", KeyLength::Bits256, || {
                let dek = DataKey::generate(KeyLength::Bits256);
                let wrapped = WrappedKey::from_bytes(dek.as_bytes().to_vec());
                Ok(CachedKey::new(dek, wrapped))
            })
            .unwrap();
        assert_ne!(short.dek().length(), long.dek().length());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn purge_keeps_slot_held_by_a_pending_caller() {
        let cache = KeyCache::default();
        let key = CacheKey::wrap(EncryptionRole::Footer, "K1", KeyLength::Bits128);

        // A caller that has looked up the slot but not locked it yet.
        let held = Arc::clone(cache.slots.lock().entry(key.clone()).or_default());
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.len(), 1);

        let generated = fresh().unwrap();
        *held.lock() = Some(CacheEntry::new(generated.clone()));
        drop(held);

        let cached = cache
            .get_or_create_with(key, cache.lifetime(), || {
                panic!("generator must not run twice in one lifetime")
            })
            .unwrap();
        assert_eq!(cached, generated);
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn purge_drops_released_empty_slot() {
        let cache = KeyCache::default();
        let key = CacheKey::wrap(EncryptionRole::Footer, "K1", KeyLength::Bits128);
        drop(Arc::clone(cache.slots.lock().entry(key).or_default()));
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }
}
