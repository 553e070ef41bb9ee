// src/run/mod.rs

//! The execution engine.
//!
//! - [`node`] holds the per-unit runtime record and its task driver: wait
//!   for dependencies, run under the parallelism gate, notify dependents.
//! - [`queue`] holds the queue-level passes: cross-linking, exclusion
//!   filtering, the group projection used for dry-run display, the
//!   scheduler itself, and error aggregation.

pub mod node;
pub mod queue;

pub use node::{DependencyOrder, RunningUnit, UnitStatus};
pub use queue::RunQueue;
