//! # colkms store
//!
//! Master key store trait and implementations for colkms.
//!
//! This crate provides the lowest-level key abstraction for colkms.
//! Master key stores are **opaque secret lookups** - they resolve an
//! identifier to raw key material and know nothing about data keys,
//! wrapping formats, or file layouts.
//!
//! ## Design Principles
//!
//! - Stores only resolve identifiers to material
//! - Material is zeroized on drop and never printed
//! - Must be `Send + Sync` for concurrent access
//! - colkms owns all wrapping and caching logic
//!
//! ## Available Stores
//!
//! - [`InMemoryKeyStore`] - For tests and locally configured keys
//! - [`FileKeyStore`] - Keys loaded from a JSON key file
//!
//! ## Example
//!
//! ```rust
//! use colkms_store::{InMemoryKeyStore, MasterKeyStore};
//!
//! let store = InMemoryKeyStore::new();
//! store.insert("footer_key", b"012footer_secret".to_vec());
//! let material = store.resolve("footer_key").unwrap();
//! assert_eq!(material.len(), 16);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod material;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileKeyStore;
pub use material::MasterKeyMaterial;
pub use memory::InMemoryKeyStore;
pub use store::MasterKeyStore;
