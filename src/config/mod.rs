//! Configuration and shared types
//!
//! Externally supplied settings and the error/outcome types every stage uses.

pub mod settings;
pub mod types;
