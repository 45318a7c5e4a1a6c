//! # colkms testkit
//!
//! Test utilities for colkms.
//!
//! This crate provides:
//! - Fixtures for the demo schema, master keys and factories
//! - Property-based test generators using proptest
//! - A call-counting master key store for cache assertions
//! - Concurrency stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use colkms_testkit::prelude::*;
//!
//! let fixture = DemoFixture::new();
//! let plan = fixture.demo_plan();
//! let context = fixture.factory.file_encryption_context(plan).unwrap();
//! assert_eq!(context.key_count(), 3);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod store;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::store::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use store::*;
pub use stress::*;
