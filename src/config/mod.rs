// src/config/mod.rs

//! Stack definition loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a stack file from disk (`loader.rs`).
//! - Validate invariants like DAG correctness (`validate.rs`).
//! - Turn a validated file into the units the engine runs (`units.rs`).

pub mod loader;
pub mod model;
pub mod units;
pub mod validate;

pub use loader::{default_stack_path, load_and_validate, load_from_path};
pub use model::{ConfigSection, DefaultSection, StackFile, UnitConfig};
pub use units::build_units;
pub use validate::validate_stack;
