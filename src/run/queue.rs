// src/run/queue.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::errors::{ErrorList, RunError};
use crate::report::{EndOptions, Report, ReportError, RunReason, RunResult};
use crate::run::node::{DependencyOrder, RunningUnit};
use crate::stack::{RunnerOptions, Unit};

/// The set of units being driven through a run, keyed by unit path.
///
/// A queue is built from plain units, cross-linked in one of the three
/// dependency directions, optionally filtered of excluded units, and then
/// either projected into display groups or executed.
#[derive(Debug)]
pub struct RunQueue {
    units: BTreeMap<String, Arc<RunningUnit>>,
}

impl RunQueue {
    /// Wrap each unit in a fresh [`RunningUnit`] with empty dependency and
    /// notification sets.
    pub fn from_units(units: impl IntoIterator<Item = Arc<Unit>>) -> Self {
        let units = units
            .into_iter()
            .map(|unit| (unit.path.clone(), Arc::new(RunningUnit::new(unit))))
            .collect();

        Self { units }
    }

    /// Convenience constructor: wrap and cross-link in one step.
    pub fn linked(
        units: impl IntoIterator<Item = Arc<Unit>>,
        order: DependencyOrder,
    ) -> Result<Self, RunError> {
        let queue = Self::from_units(units);
        queue.cross_link(order)?;
        Ok(queue)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Arc<RunningUnit>> {
        self.units.get(path)
    }

    /// Unit paths in the queue, in key order.
    pub fn paths(&self) -> Vec<String> {
        self.units.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RunningUnit>> {
        self.units.values()
    }

    /// Populate every node's dependency and notification sets from its
    /// unit's declared dependencies.
    ///
    /// - Under [`DependencyOrder::Normal`], each unit waits on the units it
    ///   depends on, and those units notify it when they finish.
    /// - Under [`DependencyOrder::Reverse`], the relation is inverted:
    ///   dependencies wait on their dependents.
    /// - Under [`DependencyOrder::Ignore`], nothing is linked.
    pub fn cross_link(&self, order: DependencyOrder) -> Result<(), RunError> {
        for node in self.units.values() {
            for dep_path in &node.unit().dependencies {
                let Some(dep) = self.units.get(dep_path) else {
                    return Err(RunError::DependencyNotFound {
                        unit: node.path().to_string(),
                        dependency: dep_path.clone(),
                    });
                };

                match order {
                    DependencyOrder::Normal => {
                        node.dependencies
                            .lock()
                            .unwrap()
                            .insert(dep.path().to_string(), dep.clone());
                        dep.notify_when_done.lock().unwrap().push(node.clone());
                    }
                    DependencyOrder::Reverse => {
                        dep.dependencies
                            .lock()
                            .unwrap()
                            .insert(node.path().to_string(), node.clone());
                        node.notify_when_done.lock().unwrap().push(dep.clone());
                    }
                    DependencyOrder::Ignore => {}
                }
            }
        }

        Ok(())
    }

    /// Produce a queue containing only non-excluded units, with references
    /// to excluded units removed from the survivors' dependency sets.
    ///
    /// For every dropped unit, when a report is present, an
    /// excluded/exclude-block entry is recorded. Report failures are
    /// collected and returned alongside the filtered queue.
    pub fn remove_excluded(&self, report: Option<&Report>) -> (RunQueue, Vec<ReportError>) {
        let mut filtered = BTreeMap::new();
        let mut errs = Vec::new();

        for (path, node) in &self.units {
            if node.is_excluded() {
                if let Some(report) = report {
                    if let Err(err) = report.ensure_run(node.path()) {
                        errs.push(err);
                        continue;
                    }

                    if let Err(err) = report.end_run(
                        node.path(),
                        EndOptions::default()
                            .with_result(RunResult::Excluded)
                            .with_reason(RunReason::ExcludeBlock),
                    ) {
                        errs.push(err);
                    }
                }
                continue;
            }

            let shell = Arc::new(node.reproject());

            for (dep_path, dep) in node.dependencies.lock().unwrap().iter() {
                if !dep.is_excluded() {
                    shell
                        .dependencies
                        .lock()
                        .unwrap()
                        .insert(dep_path.clone(), dep.clone());
                }
            }

            filtered.insert(path.clone(), shell);
        }

        (RunQueue { units: filtered }, errs)
    }

    /// Project the queue into an ordered list of groups for display: each
    /// group holds units whose dependencies are all satisfied by earlier
    /// groups, sorted by path. Presumed-applied units are dropped silently.
    ///
    /// This never executes anything and leaves the queue untouched.
    pub fn to_unit_groups(&self, max_depth: usize) -> Vec<Vec<Arc<Unit>>> {
        let mut remaining: HashMap<String, (Arc<Unit>, HashSet<String>)> = self
            .units
            .iter()
            .map(|(path, node)| {
                let deps = node
                    .dependencies
                    .lock()
                    .unwrap()
                    .keys()
                    .cloned()
                    .collect::<HashSet<_>>();
                (path.clone(), (node.unit().clone(), deps))
            })
            .collect();

        let mut groups: Vec<Vec<Arc<Unit>>> = Vec::new();

        while !remaining.is_empty() && groups.len() < max_depth {
            let mut current: Vec<Arc<Unit>> = Vec::new();
            let mut removed: Vec<String> = Vec::new();
            let mut next: HashMap<String, (Arc<Unit>, HashSet<String>)> = HashMap::new();

            for (path, (unit, deps)) in remaining {
                if unit.assume_already_applied {
                    removed.push(path);
                } else if deps.is_empty() {
                    current.push(unit);
                    removed.push(path);
                } else {
                    next.insert(path, (unit, deps));
                }
            }

            if removed.is_empty() {
                // Nothing became ready: the remaining units form a cycle.
                // Groups are a display artifact, so stop rather than spin.
                debug!(
                    remaining = next.len(),
                    "no units became ready while grouping; stopping early"
                );
                break;
            }

            for (_, (_, deps)) in next.iter_mut() {
                for path in &removed {
                    deps.remove(path);
                }
            }

            current.sort_by(|a, b| a.path.cmp(&b.path));
            remaining = next;

            if !current.is_empty() {
                groups.push(current);
            }
        }

        groups
    }

    /// Execute every unit in the queue, respecting dependency order and the
    /// parallelism bound, and return the collected unit errors.
    ///
    /// One task is spawned per unit; tasks wait on their dependencies via
    /// completion channels and the semaphore only gates the phase that
    /// actually runs the command.
    pub async fn run_all(
        &self,
        token: &CancellationToken,
        opts: &Arc<RunnerOptions>,
        report: Option<&Arc<Report>>,
        parallelism: usize,
    ) -> Result<(), ErrorList> {
        debug!(
            units = self.units.len(),
            parallelism, "running queue"
        );

        let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
        let mut handles = Vec::with_capacity(self.units.len());

        for node in self.units.values() {
            handles.push(tokio::spawn(node.clone().run_when_ready(
                opts.clone(),
                report.cloned(),
                semaphore.clone(),
                token.clone(),
            )));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "unit task failed to join");
            }
        }

        self.collect_errors().into_result()
    }

    /// Collect every unit's terminal error into a single list, in queue
    /// order.
    pub fn collect_errors(&self) -> ErrorList {
        let mut errors = ErrorList::new();

        for node in self.units.values() {
            if let Some(err) = node.err() {
                errors.push(err);
            }
        }

        errors
    }
}
