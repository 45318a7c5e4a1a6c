//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, identifiers and plans
//! that satisfy the invariants the core expects.

use colkms_core::{DataKey, EncryptionRole, KeyLength, TableSchema};
use proptest::prelude::*;

/// Strategy for data key lengths.
pub fn key_length_strategy() -> impl Strategy<Value = KeyLength> {
    prop_oneof![Just(KeyLength::Bits128), Just(KeyLength::Bits256)]
}

/// Strategy for data keys of either length.
pub fn data_key_strategy() -> impl Strategy<Value = DataKey> {
    key_length_strategy().prop_flat_map(|length| {
        prop::collection::vec(any::<u8>(), length.bytes())
            .prop_map(|bytes| DataKey::from_bytes(&bytes).expect("length matches"))
    })
}

/// Strategy for master key identifiers.
pub fn master_key_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_.:-]{0,47}").expect("Invalid regex")
}

/// Strategy for two distinct master key identifiers.
pub fn distinct_master_key_ids_strategy() -> impl Strategy<Value = (String, String)> {
    (master_key_id_strategy(), master_key_id_strategy()).prop_filter(
        "Identifiers must differ",
        |(a, b)| a != b,
    )
}

/// Strategy for master key material of arbitrary length.
pub fn master_secret_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..64)
}

/// Strategy for column names.
pub fn column_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9_]{0,23}").expect("Invalid regex")
}

/// Strategy for encryption roles.
pub fn role_strategy() -> impl Strategy<Value = EncryptionRole> {
    prop_oneof![
        Just(EncryptionRole::Footer),
        column_name_strategy().prop_map(EncryptionRole::Column),
    ]
}

/// Strategy for schemas with 1 to 12 distinct columns.
pub fn schema_strategy() -> impl Strategy<Value = TableSchema> {
    prop::collection::btree_set(column_name_strategy(), 1..12)
        .prop_map(TableSchema::from_columns)
}

/// Strategy for page payloads.
pub fn page_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_keys_have_valid_lengths(key in data_key_strategy()) {
            prop_assert_eq!(key.as_bytes().len(), key.length().bytes());
        }

        #[test]
        fn generated_schemas_are_nonempty(schema in schema_strategy()) {
            prop_assert!(!schema.is_empty());
        }
    }
}
