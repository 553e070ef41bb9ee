// src/stack/unit.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::exec::backend::UnitExecutor;
use crate::exec::writer::SharedWriter;

/// File name for a unit's saved execution plan.
const PLAN_FILE: &str = "plan.out";

/// File name for a unit's JSON-rendered plan.
const JSON_PLAN_FILE: &str = "plan.json";

/// A single infrastructure unit: one directory whose configuration is
/// applied by running an external command in it.
#[derive(Debug, Clone)]
pub struct Unit {
    /// Canonical unit path, unique within a stack. Relative to the stack
    /// root; also the unit's working directory.
    pub path: String,

    /// Paths of the units this unit depends on.
    pub dependencies: Vec<String>,

    /// The unit is presumed up to date: it is skipped without invoking the
    /// executor, and dependents treat it as satisfied.
    pub assume_already_applied: bool,

    /// The unit is excluded from the run. The exclusion filter removes it
    /// from the queue before execution.
    pub excluded: bool,

    /// Options handed to the executor backend for this unit.
    pub options: UnitOptions,
}

impl Unit {
    /// Path of the unit's saved plan file, when plan output is configured.
    ///
    /// Falls back to the JSON output directory so that JSON rendering works
    /// even when only that directory is configured.
    pub fn plan_file(&self, root: &RunnerOptions) -> Option<PathBuf> {
        let dir = root.out_dir.as_ref().or(root.json_out_dir.as_ref())?;
        Some(dir.join(&self.path).join(PLAN_FILE))
    }

    /// Path the unit's JSON-rendered plan should be written to, when JSON
    /// capture is configured.
    pub fn output_json_file(&self, root: &RunnerOptions) -> Option<PathBuf> {
        root.json_out_dir
            .as_ref()
            .map(|dir| dir.join(&self.path).join(JSON_PLAN_FILE))
    }
}

/// Per-unit options consumed by the executor backend.
#[derive(Debug, Clone)]
pub struct UnitOptions {
    /// Directory the unit's command runs in.
    pub working_dir: PathBuf,

    /// Program to invoke (e.g. `terraform`).
    pub program: String,

    /// The command being run across the stack (the first CLI argument).
    pub command: String,

    /// Full argument vector passed to the program, command included.
    pub cli_args: Vec<String>,

    /// Copy the command's stdout to the writer verbatim instead of echoing
    /// it through the debug log.
    pub forward_stdout: bool,

    /// Destination for the command's output.
    pub writer: SharedWriter,
}

impl UnitOptions {
    /// Clone these options rebased onto another working directory.
    pub fn clone_with_working_dir(&self, dir: impl Into<PathBuf>) -> UnitOptions {
        UnitOptions {
            working_dir: dir.into(),
            ..self.clone()
        }
    }
}

/// Stack-wide options for a whole run.
#[derive(Clone)]
pub struct RunnerOptions {
    /// Let units run even when one of their dependencies failed.
    pub ignore_dependency_errors: bool,

    /// Directory plan files are saved under, one subdirectory per unit.
    pub out_dir: Option<PathBuf>,

    /// Directory JSON-rendered plans are written under. Setting this
    /// enables the JSON capture step after each successful run.
    pub json_out_dir: Option<PathBuf>,

    /// The shared sink unit output is flushed to.
    pub writer: SharedWriter,

    /// Backend that actually executes unit commands.
    pub executor: Arc<dyn UnitExecutor>,
}

impl fmt::Debug for RunnerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerOptions")
            .field("ignore_dependency_errors", &self.ignore_dependency_errors)
            .field("out_dir", &self.out_dir)
            .field("json_out_dir", &self.json_out_dir)
            .finish_non_exhaustive()
    }
}
