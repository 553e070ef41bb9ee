// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::model::StackFile;
use crate::config::validate::validate_stack;

/// Load a stack file from a given path and return the raw `StackFile`.
///
/// This only performs TOML deserialization; it does **not** perform
/// semantic validation (DAG correctness, etc.). Use [`load_and_validate`]
/// for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<StackFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading stack file at {:?}", path))?;

    let config: StackFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML stack file from {:?}", path))?;

    Ok(config)
}

/// Load a stack file from path and run semantic validation.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<StackFile> {
    let config = load_from_path(&path)?;
    validate_stack(&config)?;
    Ok(config)
}

/// Default stack file path: `Rundag.toml` in the current working directory.
pub fn default_stack_path() -> PathBuf {
    PathBuf::from("Rundag.toml")
}
