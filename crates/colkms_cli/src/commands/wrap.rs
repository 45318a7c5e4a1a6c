//! Wrap command implementation.

use colkms_core::{DataKey, KeyLength, KeyWrapper, KmsResult};
use colkms_store::{FileKeyStore, MasterKeyStore};
use std::path::Path;
use std::sync::Arc;

/// A freshly wrapped data key.
#[derive(Debug)]
pub struct WrapOutput {
    /// Master key the data key is wrapped under.
    pub master_key_id: String,
    /// Data key length in bits.
    pub bits: u32,
    /// Fingerprint of the data key.
    pub fingerprint: String,
    /// Base64 wrapped key.
    pub wrapped: String,
}

/// Runs the wrap command.
pub fn run(key_file: &Path, master_key: &str, bits: u32) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileKeyStore::open(key_file)?;
    let output = wrap_new_key(Arc::new(store), master_key, bits)?;

    println!("Master key:        {}", output.master_key_id);
    println!("Data key:          {} bits, fingerprint {}", output.bits, output.fingerprint);
    println!("Wrapped key:       {}", output.wrapped);
    Ok(())
}

/// Generates a data key of `bits` and wraps it under `master_key`.
pub fn wrap_new_key(
    store: Arc<dyn MasterKeyStore>,
    master_key: &str,
    bits: u32,
) -> KmsResult<WrapOutput> {
    let length = KeyLength::from_bits(bits)?;
    let dek = DataKey::generate(length);
    let wrapped = KeyWrapper::new(store).wrap(&dek, master_key)?;

    Ok(WrapOutput {
        master_key_id: master_key.to_string(),
        bits: length.bits(),
        fingerprint: dek.fingerprint(),
        wrapped: wrapped.to_base64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use colkms_core::KmsError;
    use colkms_store::InMemoryKeyStore;

    fn store() -> Arc<dyn MasterKeyStore> {
        Arc::new(InMemoryKeyStore::with_keys([("kf", b"012footer_secret".to_vec())]))
    }

    #[test]
    fn wraps_under_known_key() {
        let output = wrap_new_key(store(), "kf", 256).unwrap();
        assert_eq!(output.bits, 256);
        assert!(!output.wrapped.is_empty());
    }

    #[test]
    fn rejects_bad_length_and_unknown_key() {
        assert!(matches!(
            wrap_new_key(store(), "kf", 64),
            Err(KmsError::InvalidPlan(_))
        ));
        assert!(matches!(
            wrap_new_key(store(), "missing", 128),
            Err(KmsError::WrapFailure { .. })
        ));
    }
}
