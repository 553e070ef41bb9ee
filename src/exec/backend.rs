// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The engine drives units through a [`UnitExecutor`] and never looks
//! inside it. This keeps the scheduler independent of how a unit actually
//! runs and makes it easy to substitute fakes in tests.
//!
//! - [`CommandExecutor`] is the production implementation: it spawns the
//!   unit's program as a child process in the unit's directory.
//! - Tests provide executors that record invocations and simulate
//!   success or failure without spawning processes.

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::report::Report;
use crate::stack::UnitOptions;

/// Trait abstracting how a single unit's command is executed.
pub trait UnitExecutor: Send + Sync {
    /// Run the unit described by `opts` to completion.
    ///
    /// The report, when present, is passed through for backends that record
    /// their own progress; the engine's own reporting does not depend on it.
    fn run_unit<'a>(
        &'a self,
        token: &'a CancellationToken,
        opts: &'a UnitOptions,
        report: Option<&'a Report>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Production executor: spawns `opts.program` with `opts.cli_args` in the
/// unit's working directory.
///
/// Stdout is streamed into the unit's writer (and echoed through the debug
/// log unless `forward_stdout` is set); stderr is consumed at debug level so
/// pipe buffers never fill. Cancellation kills the child process.
pub struct CommandExecutor;

impl UnitExecutor for CommandExecutor {
    fn run_unit<'a>(
        &'a self,
        token: &'a CancellationToken,
        opts: &'a UnitOptions,
        _report: Option<&'a Report>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            info!(
                unit = %opts.working_dir.display(),
                program = %opts.program,
                command = %opts.command,
                "starting unit command"
            );

            let mut cmd = Command::new(&opts.program);
            cmd.args(&opts.cli_args)
                .current_dir(&opts.working_dir)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = cmd.spawn().with_context(|| {
                format!(
                    "spawning {} for unit {}",
                    opts.program,
                    opts.working_dir.display()
                )
            })?;

            let stdout = child.stdout.take();
            let stderr = child.stderr.take();

            let stdout_task = stdout.map(|stdout| {
                let mut writer = opts.writer.clone();
                let forward = opts.forward_stdout;
                let unit = opts.working_dir.display().to_string();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        if !forward {
                            debug!(unit = %unit, "stdout: {}", line);
                        }
                        if writeln!(writer, "{line}").is_err() {
                            warn!(unit = %unit, "failed to write unit output");
                            break;
                        }
                    }
                })
            });

            if let Some(stderr) = stderr {
                let unit = opts.working_dir.display().to_string();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        debug!(unit = %unit, "stderr: {}", line);
                    }
                });
            }

            let status = tokio::select! {
                status = child.wait() => status.with_context(|| {
                    format!("waiting for unit {}", opts.working_dir.display())
                })?,
                _ = token.cancelled() => {
                    warn!(
                        unit = %opts.working_dir.display(),
                        "cancellation requested; killing unit command"
                    );
                    child.kill().await.ok();
                    return Err(anyhow!(
                        "command for unit {} was cancelled",
                        opts.working_dir.display()
                    ));
                }
            };

            // Drain stdout fully before returning so captured output is
            // complete when the caller inspects its buffer.
            if let Some(task) = stdout_task {
                task.await.ok();
            }

            debug!(
                unit = %opts.working_dir.display(),
                exit_code = status.code().unwrap_or(-1),
                success = status.success(),
                "unit command exited"
            );

            if status.success() {
                Ok(())
            } else {
                Err(anyhow!(
                    "command {} {} in {} exited with {}",
                    opts.program,
                    opts.cli_args.join(" "),
                    opts.working_dir.display(),
                    status
                ))
            }
        })
    }
}
