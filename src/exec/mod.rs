//! Process execution
//!
//! Child processes are spawned through [`runner::ProcessRunner`] and tracked in a
//! shared [`registry::ProcessRegistry`] until they exit or are killed.
//!
//! - [`runner`]: spawn with merged output, hard timeout, force-kill
//! - [`registry`]: concurrent id -> handle bookkeeping, sweep and kill-all
//! - [`sweeper`]: periodic background sweep
//! - [`orphans`]: start-up scan for compiler processes left by a crashed instance

pub mod orphans;
pub mod registry;
pub mod runner;
pub mod sweeper;
