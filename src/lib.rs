// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod run;
pub mod stack;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::exec::{CommandExecutor, SharedWriter};
use crate::report::Report;
use crate::run::{DependencyOrder, RunQueue};
use crate::stack::RunnerOptions;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - stack file loading and validation
/// - unit construction and cross-linking
/// - exclusion filtering
/// - dry-run display or the actual run
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let order = match args.order {
        Some(order) => order.into(),
        None => DependencyOrder::from_str(&cfg.config.order).map_err(|e| anyhow!(e))?,
    };
    let parallelism = args.parallelism.unwrap_or(cfg.config.parallelism);

    let stack_root = stack_root_dir(&config_path);
    let writer = SharedWriter::stdout();
    let units = config::build_units(&cfg, &stack_root, &args.command, &args.args, &writer);

    let queue = RunQueue::linked(units, order)?;

    let report = if args.report || cfg.config.report {
        Some(Arc::new(Report::new()))
    } else {
        None
    };

    let (queue, report_errs) = queue.remove_excluded(report.as_deref());
    if !report_errs.is_empty() {
        for err in &report_errs {
            error!(error = %err, "error recording excluded unit");
        }
        return Err(anyhow!(
            "{} error(s) occurred while recording excluded units",
            report_errs.len()
        ));
    }

    // Excluded units are already filtered out, so the dry-run shows the
    // groups that would actually execute.
    if args.dry_run {
        print_dry_run(&queue, order, parallelism);
        return Ok(());
    }

    let opts = Arc::new(RunnerOptions {
        ignore_dependency_errors: args.ignore_dependency_errors
            || cfg.config.ignore_dependency_errors,
        out_dir: cfg.config.out_dir.clone(),
        json_out_dir: cfg.config.json_out_dir.clone(),
        writer,
        executor: Arc::new(CommandExecutor),
    });

    // Ctrl-C → cancel in-flight unit commands; waiting units unwind
    // through the dependency error path.
    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            token.cancel();
        });
    }

    info!(
        units = queue.len(),
        parallelism,
        command = %args.command,
        "running stack"
    );

    let result = queue.run_all(&token, &opts, report.as_ref(), parallelism).await;

    if let Some(report) = &report {
        println!("{}", report.summary());
    }

    result?;
    Ok(())
}

/// Directory the stack file lives in; unit paths resolve against it.
fn stack_root_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Dry-run output: print the run groups without executing anything.
fn print_dry_run(queue: &RunQueue, order: DependencyOrder, parallelism: usize) {
    println!("rundag dry-run");
    println!("  order = {order:?}");
    println!("  parallelism = {parallelism}");
    println!();

    let groups = queue.to_unit_groups(usize::MAX);
    for (index, group) in groups.iter().enumerate() {
        println!("group {}:", index + 1);
        for unit in group {
            // Read the linked (and filtered) dependency set rather than the
            // unit's declared list, so pruned edges are not shown.
            let deps = queue
                .get(&unit.path)
                .map(|node| node.dependency_paths())
                .unwrap_or_default();

            if deps.is_empty() {
                println!("  - {}", unit.path);
            } else {
                println!("  - {} (after: {})", unit.path, deps.join(", "));
            }
        }
    }
}
