// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::run::DependencyOrder;

/// Command-line arguments for `rundag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rundag",
    version,
    about = "Run a stack of infrastructure units in dependency order with bounded parallelism.",
    long_about = None
)]
pub struct CliArgs {
    /// Command to run in every unit (e.g. `plan`, `apply`, `destroy`).
    pub command: String,

    /// Extra arguments appended to the command for every unit.
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,

    /// Path to the stack file (TOML).
    ///
    /// Default: `Rundag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Rundag.toml")]
    pub config: String,

    /// Maximum number of units running concurrently. Overrides the stack
    /// file.
    #[arg(long, value_name = "N")]
    pub parallelism: Option<usize>,

    /// Dependency direction. `reverse` runs leaves first (for destroy-like
    /// commands); `ignore` drops ordering entirely.
    #[arg(long, value_enum, value_name = "ORDER")]
    pub order: Option<OrderArg>,

    /// Keep running units whose dependencies failed.
    #[arg(long)]
    pub ignore_dependency_errors: bool,

    /// Print the run groups without executing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Record per-unit outcomes and print a summary after the run.
    #[arg(long)]
    pub report: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Dependency direction as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OrderArg {
    Normal,
    Reverse,
    Ignore,
}

impl From<OrderArg> for DependencyOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Normal => DependencyOrder::Normal,
            OrderArg::Reverse => DependencyOrder::Reverse,
            OrderArg::Ignore => DependencyOrder::Ignore,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
