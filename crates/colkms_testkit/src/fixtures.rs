//! Test fixtures for the demo table.
//!
//! The demo writes a small order table with the footer under one master key
//! and the two identifier columns under their own keys.

use crate::store::CountingKeyStore;
use colkms_core::{CryptoFactory, EncryptionPlan, EncryptionRole, KmsConfig, TableSchema};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Master key protecting the footer.
pub const FOOTER_KEY_ID: &str = "footer_key";
/// Master key protecting `orderId`.
pub const ORDER_ID_KEY_ID: &str = "orderid_key";
/// Master key protecting `productId`.
pub const PRODUCT_ID_KEY_ID: &str = "productid_key";

/// Demo master keys as `(identifier, secret)` pairs.
pub const DEMO_KEYS: [(&str, &str); 3] = [
    (FOOTER_KEY_ID, "012footer_secret"),
    (ORDER_ID_KEY_ID, "column_secret001"),
    (PRODUCT_ID_KEY_ID, "column_secret002"),
];

/// Columns of the demo table.
pub const DEMO_COLUMNS: [&str; 4] = ["orderId", "productId", "price", "vat"];

/// The demo schema, with `orderId` and `productId` marked sensitive.
pub fn demo_schema() -> TableSchema {
    TableSchema::new()
        .sensitive_column("orderId")
        .sensitive_column("productId")
        .column("price")
        .column("vat")
}

/// Demo master keys as store input.
pub fn demo_keys() -> Vec<(&'static str, Vec<u8>)> {
    DEMO_KEYS
        .iter()
        .map(|(id, secret)| (*id, secret.as_bytes().to_vec()))
        .collect()
}

/// One page of plaintext per demo column.
pub fn demo_pages() -> Vec<(EncryptionRole, Vec<u8>)> {
    vec![
        (EncryptionRole::column("orderId"), b"1001,1002,1003".to_vec()),
        (EncryptionRole::column("productId"), b"152,268,6548".to_vec()),
        (EncryptionRole::column("price"), b"3.25,6.48,2.12".to_vec()),
        (EncryptionRole::column("vat"), b"0.0,0.2,0.05".to_vec()),
    ]
}

/// A factory over a [`CountingKeyStore`] holding the demo keys.
pub struct DemoFixture {
    /// The instrumented store, shared with the factory.
    pub store: Arc<CountingKeyStore>,
    /// The factory under test.
    pub factory: CryptoFactory,
}

impl DemoFixture {
    /// Creates a fixture with default configuration.
    pub fn new() -> Self {
        Self::with_config(KmsConfig::default())
    }

    /// Creates a fixture with `config`.
    pub fn with_config(config: KmsConfig) -> Self {
        let store = Arc::new(CountingKeyStore::with_keys(demo_keys()));
        let factory = CryptoFactory::with_config(Arc::clone(&store), config);
        Self { store, factory }
    }

    /// The demo plan: footer, `orderId` and `productId` each under their own key.
    pub fn demo_plan(&self) -> EncryptionPlan {
        self.factory
            .plan_builder(demo_schema())
            .footer_key(FOOTER_KEY_ID)
            .column_key(ORDER_ID_KEY_ID, ["orderId"])
            .column_key(PRODUCT_ID_KEY_ID, ["productId"])
            .build()
            .expect("demo plan is valid")
    }
}

impl Default for DemoFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A JSON key file in a temporary directory.
pub struct TestKeyFile {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestKeyFile {
    /// Writes the demo keys as text secrets.
    pub fn demo() -> Self {
        Self::with_text_keys(DEMO_KEYS)
    }

    /// Writes `keys` as text secrets.
    pub fn with_text_keys<'a>(keys: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("keys.json");
        let file = Self {
            path,
            _temp_dir: temp_dir,
        };
        file.write_text_keys(keys);
        file
    }

    /// Replaces the file contents with `keys`.
    pub fn write_text_keys<'a>(&self, keys: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let entries: serde_json::Map<String, serde_json::Value> = keys
            .into_iter()
            .map(|(id, secret)| (id.to_string(), serde_json::json!({ "text": secret })))
            .collect();
        let body = serde_json::json!({ "keys": entries });
        std::fs::write(&self.path, body.to_string()).expect("Failed to write key file");
    }

    /// Path of the key file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
