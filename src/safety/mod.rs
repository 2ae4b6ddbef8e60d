//! Safety and cleanup
//!
//! Request-scoped workspaces and best-effort removal of leftovers.

pub mod cleanup;
pub mod workspace;
