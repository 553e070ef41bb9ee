// src/report/mod.rs

//! Per-unit run reporting.
//!
//! The engine records the lifecycle of every unit it touches into a
//! [`Report`]: when a run started, how it ended, and why. The report is an
//! optional collaborator (the scheduler behaves identically without one)
//! and is rendered as a [`Summary`] by the CLI when enabled.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

/// How a recorded run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    Succeeded,
    Failed,
    /// The unit was abandoned before its command ran.
    EarlyExit,
    /// The unit was excluded from the run.
    Excluded,
}

/// Why a run ended with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    /// The unit's command returned an error.
    RunError,
    /// A transitive dependency finished with an error.
    AncestorError,
    /// The unit was excluded by its stack configuration.
    ExcludeBlock,
    /// The unit is external to the queue and presumed already applied.
    ExcludeExternal,
}

/// A single unit's entry in the report.
#[derive(Debug, Clone)]
pub struct Run {
    pub path: String,
    pub result: Option<RunResult>,
    pub reason: Option<RunReason>,
    pub cause: Option<String>,
    started: Instant,
    duration: Option<Duration>,
}

impl Run {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            result: None,
            reason: None,
            cause: None,
            started: Instant::now(),
            duration: None,
        }
    }

    /// Whether the run has been ended.
    pub fn ended(&self) -> bool {
        self.duration.is_some()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    /// No run has been recorded for the unit. Callers are expected to
    /// recover from this, typically by synthesizing the missing run.
    #[error("no run found for unit {0}")]
    RunNotFound(String),

    #[error("a run for unit {0} has already been recorded")]
    DuplicateRun(String),
}

/// Options applied when ending a run. An empty value means the run
/// succeeded.
#[derive(Debug, Clone, Default)]
pub struct EndOptions {
    result: Option<RunResult>,
    reason: Option<RunReason>,
    cause: Option<String>,
}

impl EndOptions {
    pub fn with_result(mut self, result: RunResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_reason(mut self, reason: RunReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

/// Thread-safe, insertion-ordered record of unit runs.
#[derive(Debug, Default)]
pub struct Report {
    runs: Mutex<Vec<Run>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a run. Fails if a run for the same unit already
    /// exists.
    pub fn add_run(&self, run: Run) -> Result<(), ReportError> {
        let mut runs = self.runs.lock().unwrap();
        if runs.iter().any(|r| r.path == run.path) {
            return Err(ReportError::DuplicateRun(run.path));
        }
        runs.push(run);
        Ok(())
    }

    /// Record the start of a run unless one already exists.
    pub fn ensure_run(&self, path: &str) -> Result<(), ReportError> {
        let mut runs = self.runs.lock().unwrap();
        if !runs.iter().any(|r| r.path == path) {
            runs.push(Run::new(path));
        }
        Ok(())
    }

    /// End the run for `path`. Without explicit options the run is marked
    /// as succeeded.
    pub fn end_run(&self, path: &str, end: EndOptions) -> Result<(), ReportError> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs
            .iter_mut()
            .find(|r| r.path == path)
            .ok_or_else(|| ReportError::RunNotFound(path.to_string()))?;

        run.result = Some(end.result.unwrap_or(RunResult::Succeeded));
        run.reason = end.reason;
        run.cause = end.cause;
        run.duration = Some(run.started.elapsed());
        Ok(())
    }

    /// Snapshot of all recorded runs, in insertion order.
    pub fn runs(&self) -> Vec<Run> {
        self.runs.lock().unwrap().clone()
    }

    pub fn summary(&self) -> Summary {
        let runs = self.runs.lock().unwrap();
        let mut summary = Summary {
            total: runs.len(),
            ..Summary::default()
        };

        for run in runs.iter() {
            match run.result {
                Some(RunResult::Succeeded) => summary.succeeded += 1,
                Some(RunResult::Failed) => summary.failed += 1,
                Some(RunResult::EarlyExit) => summary.early_exits += 1,
                Some(RunResult::Excluded) => summary.excluded += 1,
                None => {}
            }
        }

        summary
    }
}

/// Aggregate counts over a report, grouped by result.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub early_exits: usize,
    pub excluded: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unit(s): {} succeeded, {} failed, {} aborted early, {} excluded",
            self.total, self.succeeded, self.failed, self.early_exits, self.excluded
        )
    }
}
