// src/errors.rs

//! Crate-wide error types.
//!
//! Engine failures are typed so callers can match on them. Failures coming
//! out of the executor backend are opaque; they are carried behind an `Arc`
//! so a unit's terminal error stays cloneable when it is propagated into
//! every dependent.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Terminal error of a single unit, or a cross-linking failure.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// A unit names a dependency that is not present in the run queue.
    #[error("could not find dependency {dependency} of unit {unit} while cross-linking the stack")]
    DependencyNotFound { unit: String, dependency: String },

    /// A dependency of this unit finished with an error, so this unit was
    /// never run.
    #[error("cannot process unit {unit} because its dependency {dependency} finished with an error: {source}")]
    AncestorFailed {
        unit: String,
        dependency: String,
        #[source]
        source: Box<RunError>,
    },

    /// The stack definition references units that do not exist.
    #[error("unit {unit} refers to unknown dependencies: {}", .dependencies.join(", "))]
    UnrecognizedDependencies {
        unit: String,
        dependencies: Vec<String>,
    },

    /// The unit's command failed. The underlying error comes from the
    /// executor backend and is opaque to the engine.
    #[error("unit {unit} failed: {source}")]
    Command {
        unit: String,
        source: Arc<anyhow::Error>,
    },
}

impl PartialEq for RunError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                RunError::DependencyNotFound { unit, dependency },
                RunError::DependencyNotFound {
                    unit: other_unit,
                    dependency: other_dependency,
                },
            ) => unit == other_unit && dependency == other_dependency,
            (
                RunError::AncestorFailed {
                    unit,
                    dependency,
                    source,
                },
                RunError::AncestorFailed {
                    unit: other_unit,
                    dependency: other_dependency,
                    source: other_source,
                },
            ) => unit == other_unit && dependency == other_dependency && source == other_source,
            (
                RunError::UnrecognizedDependencies { unit, dependencies },
                RunError::UnrecognizedDependencies {
                    unit: other_unit,
                    dependencies: other_dependencies,
                },
            ) => unit == other_unit && dependencies == other_dependencies,
            // Opaque command failures compare by identity first, falling
            // back to the rendered message.
            (
                RunError::Command { unit, source },
                RunError::Command {
                    unit: other_unit,
                    source: other_source,
                },
            ) => {
                unit == other_unit
                    && (Arc::ptr_eq(source, other_source)
                        || source.to_string() == other_source.to_string())
            }
            _ => false,
        }
    }
}

impl Eq for RunError {}

/// Ordered collection of unit errors produced by a single run.
///
/// Preserves insertion order and supports membership checks, so callers can
/// assert which units failed and why without re-parsing messages.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<RunError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: RunError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn contains(&self, err: &RunError) -> bool {
        self.errors.iter().any(|e| e == err)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunError> {
        self.errors.iter()
    }

    /// `Ok(())` when no errors were collected, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ErrorList> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} error(s) occurred while running the stack:", self.len())?;
        for err in &self.errors {
            writeln!(f, "  * {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}

impl IntoIterator for ErrorList {
    type Item = RunError;
    type IntoIter = std::vec::IntoIter<RunError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
