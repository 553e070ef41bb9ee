// src/stack/mod.rs

//! The unit model: what a stack is made of.
//!
//! A stack is a set of [`Unit`]s, each one a directory with declared
//! dependencies on other units. Units are plain data; the execution
//! machinery lives in [`crate::run`].

pub mod unit;

pub use unit::{RunnerOptions, Unit, UnitOptions};
