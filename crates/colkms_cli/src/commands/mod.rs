//! CLI command implementations.

pub mod check_plan;
pub mod demo;
pub mod unwrap;
pub mod wrap;
