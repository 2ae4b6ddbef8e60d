//! tribox: sandboxed compile-and-run and source analysis for Trivil snippets
//! Every child process is tracked, bounded by a timeout and killed on shutdown
//!
//! # Architecture
//!
//! ## Execution Control ([`exec`])
//! - [`exec::registry`]: Live child processes keyed by registration id
//! - [`exec::runner`]: Spawn, capture merged output, enforce timeouts
//! - [`exec::sweeper`]: Periodic reaping of finished or overdue entries
//! - [`exec::orphans`]: Start-up kill of compiler processes left by a previous run
//!
//! ## Compile Pipeline ([`judge`])
//! - [`judge::toolchain`]: Trivil compiler invocation arguments
//! - [`judge::artifacts`]: Success heuristic and executable discovery
//! - [`judge::coordinator`]: Validate, compile, locate, execute
//!
//! ## Analysis Pipeline ([`analysis`])
//! - [`analysis::lexer`]: Regex-driven static tokenizer
//! - [`analysis::ast_mining`]: Rule table over the compiler's AST dump
//! - [`analysis::enhancer`]: Best-effort semantic upgrade of static tokens
//! - [`analysis::analyzer`]: Request-level analysis response
//!
//! ## Core ([`core`])
//! - [`core::source`]: Sanitized snippets and module wrapping
//! - [`core::playground`]: Lifecycle owner for both pipelines
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::workspace`]: Per-request scratch directories
//! - [`safety::cleanup`]: Best-effort removal of build artifacts
//!
//! ## Configuration ([`config`])
//! - [`config::settings`]: Settings file, environment overrides, validation
//! - [`config::types`]: Errors and compile outcomes
//!
//! ## Kernel ([`kernel`])
//! - [`kernel::signal`]: Shutdown signal handling
//!
//! ## Utilities ([`utils`])
//! - [`utils::output`]: Bounded output draining

// Execution Control
pub mod exec;

// Compile pipeline
pub mod judge;

// Syntax analysis
pub mod analysis;

// Playground core
pub mod core;

// Safety & Cleanup
pub mod safety;

// Configuration
pub mod config;

// Kernel signal plumbing
pub mod kernel;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the tribox binary.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
