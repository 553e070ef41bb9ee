// src/run/node.rs

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::errors::RunError;
use crate::exec::writer::{MemoryWriter, SharedWriter, UnitWriter};
use crate::report::{EndOptions, Report, ReportError, Run, RunReason, RunResult};
use crate::stack::{RunnerOptions, Unit, UnitOptions};

/// Lifecycle states of a unit during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// Not all dependencies have finished yet.
    Waiting,
    /// The unit's command is being executed.
    Running,
    /// Terminal. The unit ran, was skipped, or was abandoned.
    Finished,
}

/// Direction in which dependency edges are enforced between units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DependencyOrder {
    /// Dependencies run before their dependents (apply-like commands).
    #[default]
    Normal,
    /// Dependents run before their dependencies (destroy-like commands).
    Reverse,
    /// Dependencies are not enforced at all.
    Ignore,
}

impl FromStr for DependencyOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(DependencyOrder::Normal),
            "reverse" => Ok(DependencyOrder::Reverse),
            "ignore" => Ok(DependencyOrder::Ignore),
            other => Err(format!(
                "invalid dependency order: {other} (expected \"normal\", \"reverse\" or \"ignore\")"
            )),
        }
    }
}

/// Buffer size for completion channels. Large enough that notifying a
/// dependent can never block, regardless of fan-in.
const COMPLETION_CHANNEL_SIZE: usize = 1000;

/// Runtime record for one unit in the queue.
///
/// Holds the unit's status and terminal error, the set of dependencies it
/// is still waiting on, the dependents to notify when it finishes, and a
/// private completion channel its dependencies post themselves onto as each
/// of them finishes.
#[derive(Debug)]
pub struct RunningUnit {
    unit: Arc<Unit>,
    excluded: bool,
    status: Mutex<UnitStatus>,
    err: Mutex<Option<RunError>>,
    pub(crate) dependencies: Mutex<HashMap<String, Arc<RunningUnit>>>,
    pub(crate) notify_when_done: Mutex<Vec<Arc<RunningUnit>>>,
    done_tx: mpsc::Sender<Arc<RunningUnit>>,
    done_rx: Mutex<Option<mpsc::Receiver<Arc<RunningUnit>>>>,
}

impl RunningUnit {
    /// Wrap a unit with empty dependency and notification sets. Both are
    /// filled by [`crate::run::RunQueue::cross_link`].
    pub fn new(unit: Arc<Unit>) -> Self {
        let (done_tx, done_rx) = mpsc::channel(COMPLETION_CHANNEL_SIZE);

        Self {
            excluded: unit.excluded,
            unit,
            status: Mutex::new(UnitStatus::Waiting),
            err: Mutex::new(None),
            dependencies: Mutex::new(HashMap::new()),
            notify_when_done: Mutex::new(Vec::new()),
            done_tx,
            done_rx: Mutex::new(Some(done_rx)),
        }
    }

    pub fn path(&self) -> &str {
        &self.unit.path
    }

    pub fn unit(&self) -> &Arc<Unit> {
        &self.unit
    }

    pub fn status(&self) -> UnitStatus {
        *self.status.lock().unwrap()
    }

    pub fn err(&self) -> Option<RunError> {
        self.err.lock().unwrap().clone()
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    /// Paths of the dependencies this unit is still waiting on, sorted.
    pub fn dependency_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.dependencies.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Paths of the units notified when this unit finishes, sorted.
    pub fn notify_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .notify_when_done
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.path().to_string())
            .collect();
        paths.sort();
        paths
    }

    fn remaining_dependencies(&self) -> usize {
        self.dependencies.lock().unwrap().len()
    }

    /// Shallow re-projection used by the exclusion filter.
    ///
    /// The projection shares the original's completion channel (taking over
    /// the receive side) and carries the notify list, status, and error;
    /// the dependency set starts empty for the caller to rebuild.
    pub(crate) fn reproject(&self) -> RunningUnit {
        RunningUnit {
            unit: self.unit.clone(),
            excluded: self.excluded,
            status: Mutex::new(self.status()),
            err: Mutex::new(self.err()),
            dependencies: Mutex::new(HashMap::new()),
            notify_when_done: Mutex::new(self.notify_when_done.lock().unwrap().clone()),
            done_tx: self.done_tx.clone(),
            done_rx: Mutex::new(self.done_rx.lock().unwrap().take()),
        }
    }

    /// Drive this unit to completion: wait for its dependencies, run it
    /// under the semaphore, and notify dependents.
    pub(crate) async fn run_when_ready(
        self: Arc<Self>,
        opts: Arc<RunnerOptions>,
        report: Option<Arc<Report>>,
        semaphore: Arc<Semaphore>,
        token: CancellationToken,
    ) {
        let rx = self.done_rx.lock().unwrap().take();
        let Some(mut rx) = rx else {
            // A node is scheduled exactly once; a missing receiver means
            // the queue was run twice. Finish so dependents are not stuck.
            error!(unit = %self.path(), "completion receiver already taken; unit was not run");
            self.finished(None, report.as_deref());
            return;
        };

        let wait_result = self
            .wait_for_dependencies(&mut rx, &opts, report.as_deref())
            .await;

        // Admission happens after the wait so that units parked on their
        // dependencies do not consume concurrency slots. The permit is
        // released when it drops, on every exit path.
        let _permit = semaphore.acquire_owned().await.ok();

        let result = match wait_result {
            Ok(()) => self.run_now(&opts, report.as_deref(), &token).await,
            Err(err) => Err(err),
        };

        self.finished(result.err(), report.as_deref());
    }

    /// Wait for all of this unit's dependencies to finish. Returns an error
    /// if any of them finished with an error, unless dependency errors are
    /// ignored. Returns immediately if the unit has no dependencies.
    async fn wait_for_dependencies(
        &self,
        rx: &mut mpsc::Receiver<Arc<RunningUnit>>,
        opts: &RunnerOptions,
        report: Option<&Report>,
    ) -> Result<(), RunError> {
        debug!(
            unit = %self.path(),
            remaining = self.remaining_dependencies(),
            "unit is waiting for its dependencies to finish"
        );

        while self.remaining_dependencies() > 0 {
            let Some(done) = rx.recv().await else {
                // Unreachable: this node holds its own sender for the whole
                // wait.
                warn!(unit = %self.path(), "completion channel closed while waiting");
                return Ok(());
            };

            self.dependencies.lock().unwrap().remove(done.path());

            let Some(dep_err) = done.err() else {
                debug!(
                    unit = %self.path(),
                    dependency = %done.path(),
                    remaining = self.remaining_dependencies(),
                    "dependency finished successfully"
                );
                continue;
            };

            if opts.ignore_dependency_errors {
                error!(
                    unit = %self.path(),
                    dependency = %done.path(),
                    "dependency finished with an error; running the unit anyway because dependency errors are ignored"
                );
                continue;
            }

            error!(
                unit = %self.path(),
                dependency = %done.path(),
                "dependency finished with an error; the unit will not run"
            );

            if let Some(report) = report {
                self.record_early_exit(report, done.path());
            }

            return Err(RunError::AncestorFailed {
                unit: self.path().to_string(),
                dependency: done.path().to_string(),
                source: Box::new(dep_err),
            });
        }

        Ok(())
    }

    fn record_early_exit(&self, report: &Report, dependency: &str) {
        if let Err(err) = report.ensure_run(self.path()) {
            error!(unit = %self.path(), error = %err, "error ensuring run for unit");
            return;
        }

        if let Err(err) = report.end_run(
            self.path(),
            EndOptions::default()
                .with_result(RunResult::EarlyExit)
                .with_reason(RunReason::AncestorError)
                .with_cause(dependency),
        ) {
            error!(unit = %self.path(), error = %err, "error ending run for unit");
        }
    }

    /// Run the unit right now: skip it when it is presumed applied,
    /// otherwise execute its command and the optional JSON capture step.
    async fn run_now(
        &self,
        opts: &RunnerOptions,
        report: Option<&Report>,
        token: &CancellationToken,
    ) -> Result<(), RunError> {
        *self.status.lock().unwrap() = UnitStatus::Running;

        if self.unit.assume_already_applied {
            debug!(unit = %self.path(), "assuming unit has already been applied; skipping");
            return Ok(());
        }

        self.run_command(opts, report, token).await?;

        if let Some(output_file) = self.unit.output_json_file(opts) {
            self.capture_json_plan(opts, report, token, &output_file)
                .await?;
        }

        Ok(())
    }

    async fn run_command(
        &self,
        opts: &RunnerOptions,
        report: Option<&Report>,
        token: &CancellationToken,
    ) -> Result<(), RunError> {
        debug!(unit = %self.path(), "running unit");

        let mut run_opts = self.unit.options.clone();
        let unit_writer = UnitWriter::new(run_opts.writer.clone());
        run_opts.writer = SharedWriter::new(unit_writer.clone());

        let result = self
            .run_command_inner(&run_opts, opts, report, token)
            .await;

        // Release the unit's buffered output in one piece, whatever the
        // command did.
        if let Err(err) = unit_writer.flush_output() {
            error!(unit = %self.path(), error = %err, "error flushing unit output");
        }

        result
    }

    async fn run_command_inner(
        &self,
        run_opts: &UnitOptions,
        opts: &RunnerOptions,
        report: Option<&Report>,
        token: &CancellationToken,
    ) -> Result<(), RunError> {
        if let Some(report) = report {
            report
                .add_run(Run::new(self.path()))
                .map_err(|err| self.command_error(anyhow::Error::new(err)))?;
        }

        opts.executor
            .run_unit(token, run_opts, report)
            .await
            .map_err(|err| self.command_error(err))
    }

    /// Render the unit's saved plan as JSON and write it to `output_file`.
    async fn capture_json_plan(
        &self,
        opts: &RunnerOptions,
        report: Option<&Report>,
        token: &CancellationToken,
        output_file: &Path,
    ) -> Result<(), RunError> {
        let Some(plan_file) = self.unit.plan_file(opts) else {
            return Ok(());
        };

        debug!(
            unit = %self.path(),
            output = %output_file.display(),
            "rendering unit plan as JSON"
        );

        let buffer = MemoryWriter::new();
        let mut json_opts = self.unit.options.clone();
        json_opts.forward_stdout = true;
        json_opts.command = "show".to_string();
        json_opts.cli_args = vec![
            "show".to_string(),
            "-json".to_string(),
            plan_file.display().to_string(),
        ];
        json_opts.writer = SharedWriter::new(buffer.clone());

        opts.executor
            .run_unit(token, &json_opts, report)
            .await
            .map_err(|err| self.command_error(err))?;

        if let Some(json_dir) = output_file.parent() {
            tokio::fs::create_dir_all(json_dir)
                .await
                .with_context(|| format!("creating JSON output directory {}", json_dir.display()))
                .map_err(|err| self.command_error(err))?;
        }

        tokio::fs::write(output_file, buffer.contents())
            .await
            .with_context(|| format!("writing JSON plan to {}", output_file.display()))
            .map_err(|err| self.command_error(err))
    }

    fn command_error(&self, source: anyhow::Error) -> RunError {
        RunError::Command {
            unit: self.path().to_string(),
            source: Arc::new(source),
        }
    }

    /// Record that the unit has finished and notify every dependent.
    fn finished(self: &Arc<Self>, result_err: Option<RunError>, report: Option<&Report>) {
        match &result_err {
            None => {
                debug!(unit = %self.path(), "unit finished successfully");
                if let Some(report) = report {
                    self.record_success(report);
                }
            }
            Some(err) => {
                error!(unit = %self.path(), error = %err, "unit finished with an error");
                if let Some(report) = report {
                    self.record_failure(report, err);
                }
            }
        }

        *self.status.lock().unwrap() = UnitStatus::Finished;
        *self.err.lock().unwrap() = result_err;

        for dependent in self.notify_when_done.lock().unwrap().iter() {
            if let Err(err) = dependent.done_tx.try_send(Arc::clone(self)) {
                error!(
                    unit = %self.path(),
                    dependent = %dependent.path(),
                    error = %err,
                    "failed to notify dependent"
                );
            }
        }
    }

    fn record_success(&self, report: &Report) {
        match report.end_run(self.path(), EndOptions::default()) {
            Ok(()) => {}
            Err(ReportError::RunNotFound(_)) => {
                // The unit never registered a run. Assumed-applied units get
                // a synthesized excluded entry; anything else was an external
                // dependency pruned from the queue and stays unreported.
                if !self.unit.assume_already_applied {
                    return;
                }

                if let Err(err) = report.add_run(Run::new(self.path())) {
                    error!(unit = %self.path(), error = %err, "error adding run for unit");
                    return;
                }

                if let Err(err) = report.end_run(
                    self.path(),
                    EndOptions::default()
                        .with_result(RunResult::Excluded)
                        .with_reason(RunReason::ExcludeExternal),
                ) {
                    error!(unit = %self.path(), error = %err, "error ending run for unit");
                }
            }
            Err(err) => {
                error!(unit = %self.path(), error = %err, "error ending run for unit");
            }
        }
    }

    fn record_failure(&self, report: &Report, unit_err: &RunError) {
        let end = EndOptions::default()
            .with_result(RunResult::Failed)
            .with_reason(RunReason::RunError)
            .with_cause(unit_err.to_string());

        match report.end_run(self.path(), end.clone()) {
            Ok(()) => {}
            Err(ReportError::RunNotFound(_)) => {
                if let Err(err) = report.add_run(Run::new(self.path())) {
                    error!(unit = %self.path(), error = %err, "error adding run for unit");
                    return;
                }

                if let Err(err) = report.end_run(self.path(), end) {
                    error!(unit = %self.path(), error = %err, "error ending run for unit");
                }
            }
            Err(err) => {
                error!(unit = %self.path(), error = %err, "error ending run for unit");
            }
        }
    }
}
