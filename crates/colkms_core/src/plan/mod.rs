//! Encryption plans: which master key protects which part of a file.

mod builder;
mod file;
mod schema;

pub use builder::{EncryptionPlan, EncryptionPlanBuilder};
pub use file::PlanFile;
pub use schema::{ColumnSpec, TableSchema};
