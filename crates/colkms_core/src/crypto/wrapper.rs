//! Wrapping data keys under master keys from a [`MasterKeyStore`].

use super::wrap;
use crate::error::{KmsError, KmsResult};
use crate::types::{DataKey, WrappedKey};
use colkms_store::MasterKeyStore;
use std::sync::Arc;

/// Wraps and unwraps data keys using master keys resolved from a store.
///
/// The wrapper holds no state of its own beyond the store handle. Every
/// call resolves the master key afresh; caching lives in
/// [`KeyCache`](crate::KeyCache).
#[derive(Clone)]
pub struct KeyWrapper {
    store: Arc<dyn MasterKeyStore>,
}

impl KeyWrapper {
    /// Creates a wrapper over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn MasterKeyStore>) -> Self {
        Self { store }
    }

    /// Wraps `dek` under the master key `master_key_id`.
    ///
    /// Each call uses a fresh nonce, so wrapping the same key twice yields
    /// different tokens.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::WrapFailure`] if the master key cannot be resolved
    /// or the key cannot be sealed.
    pub fn wrap(&self, dek: &DataKey, master_key_id: &str) -> KmsResult<WrappedKey> {
        let material = self
            .store
            .resolve(master_key_id)
            .map_err(|e| KmsError::wrap_failure(master_key_id, e.to_string()))?;

        let wrapped = wrap::seal(dek, master_key_id, &material)?;
        tracing::debug!(
            master_key_id,
            dek = %dek.fingerprint(),
            token_len = wrapped.len(),
            "wrapped data key"
        );
        Ok(wrapped)
    }

    /// Recovers the data key inside `wrapped`, which must have been wrapped
    /// under `master_key_id`.
    ///
    /// # Errors
    ///
    /// - [`KmsError::CorruptWrappedKey`] if the token cannot be parsed
    /// - [`KmsError::KeyMismatch`] if the token names a different master key
    ///   or does not authenticate under this one
    /// - [`KmsError::UnknownKeyIdentifier`] if the store lacks the key
    pub fn unwrap(&self, wrapped: &WrappedKey, master_key_id: &str) -> KmsResult<DataKey> {
        let parsed = wrap::parse(wrapped.as_bytes())?;
        if parsed.master_key_id != master_key_id {
            tracing::warn!(
                expected = master_key_id,
                found = parsed.master_key_id,
                "wrapped key names a different master key"
            );
            return Err(KmsError::key_mismatch(master_key_id, parsed.master_key_id));
        }

        let material = self.store.resolve(master_key_id)?;
        wrap::open(&parsed, master_key_id, &material).inspect_err(|err| {
            if matches!(err, KmsError::KeyMismatch { .. }) {
                tracing::warn!(master_key_id, "wrapped key failed authentication");
            }
        })
    }
}

impl std::fmt::Debug for KeyWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyWrapper").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyLength;
    use colkms_store::InMemoryKeyStore;

    fn wrapper() -> (Arc<InMemoryKeyStore>, KeyWrapper) {
        let store = Arc::new(InMemoryKeyStore::with_keys([
            ("K1", b"012footer_secret".to_vec()),
            ("K2", b"column_secret001".to_vec()),
        ]));
        let wrapper = KeyWrapper::new(store.clone());
        (store, wrapper)
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let (_, wrapper) = wrapper();
        let dek = DataKey::generate(KeyLength::Bits128);
        let wrapped = wrapper.wrap(&dek, "K1").unwrap();
        assert_eq!(wrapper.unwrap(&wrapped, "K1").unwrap(), dek);
    }

    #[test]
    fn unwrap_with_other_key_is_mismatch() {
        let (_, wrapper) = wrapper();
        let dek = DataKey::generate(KeyLength::Bits256);
        let wrapped = wrapper.wrap(&dek, "K1").unwrap();
        assert!(matches!(
            wrapper.unwrap(&wrapped, "K2"),
            Err(KmsError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn wrap_unknown_key_is_wrap_failure() {
        let (_, wrapper) = wrapper();
        let dek = DataKey::generate(KeyLength::Bits128);
        assert!(matches!(
            wrapper.wrap(&dek, "missing"),
            Err(KmsError::WrapFailure { ref id, .. }) if id == "missing"
        ));
    }

    #[test]
    fn unwrap_after_revocation_is_unknown_key() {
        let (store, wrapper) = wrapper();
        let dek = DataKey::generate(KeyLength::Bits128);
        let wrapped = wrapper.wrap(&dek, "K2").unwrap();

        store.remove("K2");
        assert!(matches!(
            wrapper.unwrap(&wrapped, "K2"),
            Err(KmsError::UnknownKeyIdentifier { .. })
        ));
    }

    #[test]
    fn unwrap_after_rotation_is_mismatch() {
        let (store, wrapper) = wrapper();
        let dek = DataKey::generate(KeyLength::Bits128);
        let wrapped = wrapper.wrap(&dek, "K1").unwrap();

        store.insert("K1", b"rotated_secret!!".to_vec());
        assert!(matches!(
            wrapper.unwrap(&wrapped, "K1"),
            Err(KmsError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn unwrap_garbage_is_corrupt() {
        let (_, wrapper) = wrapper();
        let garbage = WrappedKey::from_bytes(vec![0xEE; 10]);
        assert!(matches!(
            wrapper.unwrap(&garbage, "K1"),
            Err(KmsError::CorruptWrappedKey { .. })
        ));
    }

    #[test]
    fn flipped_sealed_byte_never_yields_key() {
        let (_, wrapper) = wrapper();
        let dek = DataKey::generate(KeyLength::Bits128);
        let token = wrapper.wrap(&dek, "K1").unwrap().into_bytes();

        for i in 0..token.len() {
            let mut tampered = token.clone();
            tampered[i] ^= 0x01;
            let result = wrapper.unwrap(&WrappedKey::from_bytes(tampered), "K1");
            assert!(
                matches!(
                    result,
                    Err(KmsError::CorruptWrappedKey { .. }) | Err(KmsError::KeyMismatch { .. })
                ),
                "byte {i} flip returned {result:?}"
            );
        }
    }
}
