//! Kernel interaction
//!
//! - [`signal`]: async-safe shutdown signal handling
//!
//! Process spawning goes through `std::process`; signals and raw kills use `nix`.

pub mod signal;
