//! Cryptographic operations for colkms.
//!
//! ## Security Model
//!
//! - Data keys are wrapped with AES-256-GCM under a key derived from the
//!   master key material with HKDF-SHA256
//! - Wrapped tokens name their master key and authenticate that name
//! - Unique nonce per wrap and per page encryption
//! - Data keys and derived key-encryption keys are zeroized on drop

mod cipher;
pub(crate) mod wrap;
mod wrapper;

pub use cipher::PageCipher;
pub use wrap::{embedded_master_key_id, NONCE_SIZE, TAG_SIZE, WRAP_FORMAT_VERSION};
pub use wrapper::KeyWrapper;
