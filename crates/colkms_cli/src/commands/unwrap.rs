//! Unwrap command implementation.

use colkms_core::{embedded_master_key_id, KeyWrapper, KmsResult, WrappedKey};
use colkms_store::{FileKeyStore, MasterKeyStore};
use std::path::Path;
use std::sync::Arc;

/// A verified wrapped key.
#[derive(Debug)]
pub struct UnwrapOutput {
    /// Master key the token names.
    pub master_key_id: String,
    /// Data key length in bits.
    pub bits: u32,
    /// Fingerprint of the recovered data key.
    pub fingerprint: String,
}

/// Runs the unwrap command.
pub fn run(key_file: &Path, master_key: &str, wrapped: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileKeyStore::open(key_file)?;
    match verify_wrapped_key(Arc::new(store), master_key, wrapped) {
        Ok(output) => {
            println!("✓ Wrapped key authenticates under '{}'", output.master_key_id);
            println!("Data key:          {} bits, fingerprint {}", output.bits, output.fingerprint);
            Ok(())
        }
        Err(e) => {
            println!("✗ Wrapped key rejected");
            Err(e.into())
        }
    }
}

/// Unwraps the base64 token `wrapped` under `master_key`.
pub fn verify_wrapped_key(
    store: Arc<dyn MasterKeyStore>,
    master_key: &str,
    wrapped: &str,
) -> KmsResult<UnwrapOutput> {
    let token = WrappedKey::from_base64(wrapped.trim())?;
    let claimed = embedded_master_key_id(&token)?;
    tracing::debug!(claimed = %claimed, expected = master_key, "parsed wrapped key");

    let dek = KeyWrapper::new(store).unwrap(&token, master_key)?;
    Ok(UnwrapOutput {
        master_key_id: claimed,
        bits: dek.length().bits(),
        fingerprint: dek.fingerprint(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::wrap::wrap_new_key;
    use colkms_core::KmsError;
    use colkms_store::InMemoryKeyStore;

    fn store() -> Arc<dyn MasterKeyStore> {
        Arc::new(InMemoryKeyStore::with_keys([
            ("K1", b"012footer_secret".to_vec()),
            ("K2", b"column_secret001".to_vec()),
        ]))
    }

    #[test]
    fn verifies_what_wrap_produced() {
        let store = store();
        let wrapped = wrap_new_key(Arc::clone(&store), "K1", 128).unwrap();
        let verified = verify_wrapped_key(store, "K1", &wrapped.wrapped).unwrap();
        assert_eq!(verified.fingerprint, wrapped.fingerprint);
        assert_eq!(verified.master_key_id, "K1");
    }

    #[test]
    fn rejects_other_master_key_and_garbage() {
        let store = store();
        let wrapped = wrap_new_key(Arc::clone(&store), "K1", 128).unwrap();
        assert!(matches!(
            verify_wrapped_key(Arc::clone(&store), "K2", &wrapped.wrapped),
            Err(KmsError::KeyMismatch { .. })
        ));
        assert!(matches!(
            verify_wrapped_key(store, "K1", "AAAA"),
            Err(KmsError::CorruptWrappedKey { .. })
        ));
    }
}
