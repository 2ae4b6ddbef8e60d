//! Playground core.
//!
//! [`playground::Playground`] wires the process registry, the compile
//! coordinator and the analyzer together and owns their lifecycle.
//! [`source::SourceUnit`] is the sanitized snippet both pipelines consume.

pub mod playground;
pub mod source;
