//! # colkms core
//!
//! Envelope key management for columnar file encryption.
//!
//! This crate provides:
//! - Data key generation and authenticated wrapping under master keys
//! - A time-bounded key cache with per-key locking
//! - Validated encryption plans mapping the footer and columns to master keys
//! - The [`CryptoFactory`] that turns plans into per-file key contexts and
//!   persisted key metadata back into data keys
//!
//! ## Example
//!
//! ```rust
//! use colkms_core::{CryptoFactory, EncryptionRole, MasterKeyLookup, TableSchema};
//! use colkms_store::InMemoryKeyStore;
//!
//! let store = InMemoryKeyStore::with_keys([
//!     ("K1", b"012footer_secret".to_vec()),
//!     ("K2", b"column_secret001".to_vec()),
//! ]);
//! let factory = CryptoFactory::new(store);
//!
//! let schema = TableSchema::from_columns(["orderId", "price"]);
//! let plan = factory
//!     .plan_builder(schema)
//!     .footer_key("K1")
//!     .column_key("K2", ["orderId"])
//!     .build()
//!     .unwrap();
//!
//! let writer = factory.file_encryption_context(plan).unwrap();
//! let role = EncryptionRole::column("orderId");
//! let page = writer.encrypt(&role, b"1001").unwrap();
//! let metadata = writer.finish().unwrap();
//!
//! let reader = factory
//!     .file_decryption_context(&metadata, &MasterKeyLookup::FromMetadata)
//!     .unwrap();
//! assert_eq!(reader.decrypt(&role, &page).unwrap(), b"1001");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod cache;
mod config;
mod crypto;
mod error;
mod factory;
mod plan;
mod types;

pub use cache::{CacheKey, CacheStats, CachedKey, KeyCache, DEFAULT_CACHE_LIFETIME};
pub use config::KmsConfig;
pub use crypto::{
    embedded_master_key_id, KeyWrapper, PageCipher, NONCE_SIZE, TAG_SIZE, WRAP_FORMAT_VERSION,
};
pub use error::{KmsError, KmsResult, PlanViolation};
pub use factory::{
    CryptoFactory, FileDecryptionContext, FileEncryptionContext, FileKeyMetadata, KeyMaterial,
    KeyOperation, MasterKeyLookup, OperationKind, OperationState, RoleKey, KEY_MATERIAL_TYPE,
};
pub use plan::{ColumnSpec, EncryptionPlan, EncryptionPlanBuilder, PlanFile, TableSchema};
pub use types::{DataKey, EncryptionAlgorithm, EncryptionRole, KeyLength, WrappedKey};

pub use colkms_store::{InMemoryKeyStore, MasterKeyMaterial, MasterKeyStore, StoreError};
