//! Benchmark utilities.

use colkms_core::{CryptoFactory, EncryptionPlan, KmsConfig, TableSchema};
use colkms_store::InMemoryKeyStore;
use rand::Rng;

/// Generate random page data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Column names `col_0 .. col_{count-1}`.
pub fn column_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("col_{i}")).collect()
}

/// A store with a footer key and one master key per column.
pub fn store_for_columns(count: usize) -> InMemoryKeyStore {
    let store = InMemoryKeyStore::new();
    store.insert("footer_key", b"012footer_secret".to_vec());
    for i in 0..count {
        store.insert(format!("key_{i}"), format!("column_secret{i:03}").into_bytes());
    }
    store
}

/// A factory over [`store_for_columns`].
pub fn factory_for_columns(count: usize, config: KmsConfig) -> CryptoFactory {
    CryptoFactory::with_config(store_for_columns(count), config)
}

/// A plan encrypting every one of `count` columns under its own key.
pub fn per_column_plan(factory: &CryptoFactory, count: usize) -> EncryptionPlan {
    let columns = column_names(count);
    let mut builder = factory
        .plan_builder(TableSchema::from_columns(columns.iter().cloned()))
        .footer_key("footer_key");
    for (i, column) in columns.into_iter().enumerate() {
        builder = builder.column_key(format!("key_{i}"), [column]);
    }
    builder.build().expect("benchmark plan is valid")
}
