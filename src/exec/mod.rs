// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the commands behind
//! units, using `tokio::process::Command`, and for the output plumbing
//! that keeps concurrent units from interleaving their output.
//!
//! - [`backend`] defines the [`UnitExecutor`] seam and the production
//!   [`CommandExecutor`].
//! - [`writer`] holds the shared/buffered writer types.

pub mod backend;
pub mod writer;

pub use backend::{CommandExecutor, UnitExecutor};
pub use writer::{MemoryWriter, SharedWriter, UnitWriter};
