//! Master key store loaded from a JSON key file.

use crate::error::{StoreError, StoreResult};
use crate::material::MasterKeyMaterial;
use crate::store::MasterKeyStore;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// On-disk key file layout.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyFile {
    keys: HashMap<String, KeyEntry>,
}

/// A single key entry, either a text secret or hex-encoded bytes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum KeyEntry {
    Text(String),
    Hex(String),
}

/// A master key store that reads its keys from a JSON file.
///
/// The file maps identifiers to either a text secret or hex bytes:
///
/// ```json
/// {
///   "keys": {
///     "footer_key": { "text": "012footer_secret" },
///     "orderid_key": { "hex": "636f6c756d6e5f736563726574303031" }
///   }
/// }
/// ```
///
/// Keys are read once on [`open`](Self::open). [`reload`](Self::reload)
/// re-reads the file, which is how rotated keys are picked up.
///
/// # Example
///
/// ```no_run
/// use colkms_store::{FileKeyStore, MasterKeyStore};
/// use std::path::Path;
///
/// let store = FileKeyStore::open(Path::new("keys.json")).unwrap();
/// let material = store.resolve("footer_key").unwrap();
/// ```
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    keys: RwLock<HashMap<String, MasterKeyMaterial>>,
}

impl FileKeyStore {
    /// Opens the key file at `path` and loads its keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON,
    /// holds invalid hex, or holds an empty secret.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let keys = load(path)?;
        tracing::debug!(path = %path.display(), keys = keys.len(), "loaded key file");
        Ok(Self {
            path: path.to_path_buf(),
            keys: RwLock::new(keys),
        })
    }

    /// Re-reads the key file, replacing all keys.
    ///
    /// On error the previously loaded keys stay in place.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn reload(&self) -> StoreResult<()> {
        let keys = load(&self.path)?;
        tracing::info!(path = %self.path.display(), keys = keys.len(), "reloaded key file");
        *self.keys.write() = keys;
        Ok(())
    }

    /// Returns the path to the key file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of keys loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Returns true if the file held no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl MasterKeyStore for FileKeyStore {
    fn resolve(&self, identifier: &str) -> StoreResult<MasterKeyMaterial> {
        self.keys
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| StoreError::unknown_key(identifier))
    }
}

fn load(path: &Path) -> StoreResult<HashMap<String, MasterKeyMaterial>> {
    let contents = std::fs::read_to_string(path)?;
    let file: KeyFile = serde_json::from_str(&contents)
        .map_err(|e| StoreError::InvalidKeyFile(e.to_string()))?;

    let mut keys = HashMap::with_capacity(file.keys.len());
    for (id, entry) in file.keys {
        let bytes = match entry {
            KeyEntry::Text(text) => text.into_bytes(),
            KeyEntry::Hex(encoded) => hex::decode(encoded.trim())
                .map_err(|e| StoreError::InvalidKeyFile(format!("key '{id}': {e}")))?,
        };
        if bytes.is_empty() {
            return Err(StoreError::InvalidKeyFile(format!("key '{id}' is empty")));
        }
        keys.insert(id, MasterKeyMaterial::new(bytes));
    }
    Ok(keys)
}
