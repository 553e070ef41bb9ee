#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;

use rundag::errors::ErrorList;
use rundag::exec::{MemoryWriter, SharedWriter, UnitExecutor};
use rundag::report::Report;
use rundag::run::RunQueue;
use rundag::stack::{RunnerOptions, Unit, UnitOptions};

/// Builder for `Unit` to simplify test setup.
pub struct UnitBuilder {
    path: String,
    after: Vec<String>,
    assume_already_applied: bool,
    excluded: bool,
}

impl UnitBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            after: vec![],
            assume_already_applied: false,
            excluded: false,
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.after.push(dep.to_string());
        self
    }

    pub fn assume_already_applied(mut self) -> Self {
        self.assume_already_applied = true;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    pub fn build(self) -> Arc<Unit> {
        Arc::new(Unit {
            options: UnitOptions {
                working_dir: PathBuf::from(&self.path),
                program: "true".to_string(),
                command: "apply".to_string(),
                cli_args: vec!["apply".to_string()],
                forward_stdout: false,
                writer: SharedWriter::new(MemoryWriter::new()),
            },
            path: self.path,
            dependencies: self.after,
            assume_already_applied: self.assume_already_applied,
            excluded: self.excluded,
        })
    }
}

/// Shorthand for a unit with no dependencies or flags.
pub fn unit(path: &str) -> Arc<Unit> {
    UnitBuilder::new(path).build()
}

fn unit_name(opts: &UnitOptions) -> String {
    opts.working_dir.display().to_string()
}

/// A fake executor that records which units were "run" (in start order)
/// and completes immediately, failing the configured set.
pub struct FakeExecutor {
    pub executed: Arc<Mutex<Vec<String>>>,
    fail: HashSet<String>,
    delay: Option<Duration>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            executed: Arc::new(Mutex::new(Vec::new())),
            fail: HashSet::new(),
            delay: None,
        }
    }

    pub fn failing<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fail: paths.into_iter().map(Into::into).collect(),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl UnitExecutor for FakeExecutor {
    fn run_unit<'a>(
        &'a self,
        _token: &'a CancellationToken,
        opts: &'a UnitOptions,
        _report: Option<&'a Report>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let name = unit_name(opts);
            self.executed.lock().unwrap().push(name.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.fail.contains(&name) {
                Err(anyhow!("unit {name} exploded"))
            } else {
                Ok(())
            }
        })
    }
}

/// Executor that tracks how many units are inside it at once, so tests can
/// assert the parallelism bound.
pub struct GaugeExecutor {
    pub current: Arc<AtomicUsize>,
    pub max_seen: Arc<AtomicUsize>,
    delay: Duration,
}

impl GaugeExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            current: Arc::new(AtomicUsize::new(0)),
            max_seen: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }
}

impl UnitExecutor for GaugeExecutor {
    fn run_unit<'a>(
        &'a self,
        _token: &'a CancellationToken,
        _opts: &'a UnitOptions,
        _report: Option<&'a Report>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Executor for JSON capture tests: records every invocation and emits a
/// canned JSON document whenever the `show` command is run.
pub struct ShowExecutor {
    pub invocations: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    pub json: String,
}

impl ShowExecutor {
    pub fn new(json: &str) -> Self {
        Self {
            invocations: Arc::new(Mutex::new(Vec::new())),
            json: json.to_string(),
        }
    }

    pub fn invocations(&self) -> Vec<(String, Vec<String>)> {
        self.invocations.lock().unwrap().clone()
    }
}

impl UnitExecutor for ShowExecutor {
    fn run_unit<'a>(
        &'a self,
        _token: &'a CancellationToken,
        opts: &'a UnitOptions,
        _report: Option<&'a Report>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.invocations
                .lock()
                .unwrap()
                .push((opts.command.clone(), opts.cli_args.clone()));

            if opts.command == "show" {
                let mut writer = opts.writer.clone();
                writeln!(writer, "{}", self.json)?;
            }

            Ok(())
        })
    }
}

/// Runner options wired to the given executor, writing into a throwaway
/// memory buffer.
pub fn runner_options(executor: Arc<dyn UnitExecutor>) -> RunnerOptions {
    RunnerOptions {
        ignore_dependency_errors: false,
        out_dir: None,
        json_out_dir: None,
        writer: SharedWriter::new(MemoryWriter::new()),
        executor,
    }
}

/// Run the queue with a fresh cancellation token.
pub async fn run_queue(
    queue: &RunQueue,
    opts: &Arc<RunnerOptions>,
    report: Option<&Arc<Report>>,
    parallelism: usize,
) -> Result<(), ErrorList> {
    queue
        .run_all(&CancellationToken::new(), opts, report, parallelism)
        .await
}
