//! Compile-and-run judging.
//!
//! The coordinator drives one request from source text to a classified
//! [`CompileOutcome`](crate::config::types::CompileOutcome). Command lines live
//! in the toolchain; artifact conventions live in `artifacts`.

pub mod artifacts;
pub mod coordinator;
pub mod toolchain;
