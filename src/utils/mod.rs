//! Utilities
//!
//! - [`output`]: non-blocking output drain and output bounds

pub mod output;
