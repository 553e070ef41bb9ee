// src/config/units.rs

use std::path::Path;
use std::sync::Arc;

use crate::config::model::StackFile;
use crate::exec::writer::SharedWriter;
use crate::stack::{Unit, UnitOptions};

/// Program used when neither the unit nor `[default]` sets one.
const DEFAULT_PROGRAM: &str = "terraform";

/// Convert a validated stack file into the units the engine runs.
///
/// `command` and `extra_args` come from the CLI and apply to every unit;
/// each unit's working directory is its path resolved against the stack
/// root (the directory containing the stack file).
pub fn build_units(
    cfg: &StackFile,
    stack_root: &Path,
    command: &str,
    extra_args: &[String],
    writer: &SharedWriter,
) -> Vec<Arc<Unit>> {
    let mut cli_args = vec![command.to_string()];
    cli_args.extend(extra_args.iter().cloned());

    let default_program = cfg
        .default
        .program
        .clone()
        .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());

    let template = UnitOptions {
        working_dir: stack_root.to_path_buf(),
        program: default_program,
        command: command.to_string(),
        cli_args,
        forward_stdout: cfg.config.forward_stdout,
        writer: writer.clone(),
    };

    cfg.unit
        .iter()
        .map(|(name, unit_cfg)| {
            let path = unit_cfg.path.clone().unwrap_or_else(|| name.clone());

            let mut options = template.clone_with_working_dir(stack_root.join(&path));
            if let Some(program) = &unit_cfg.program {
                options.program = program.clone();
            }

            // `after` holds unit names; the engine keys everything by path.
            let dependencies = unit_cfg
                .after
                .iter()
                .map(|dep| cfg.unit_path(dep))
                .collect();

            Arc::new(Unit {
                path,
                dependencies,
                assume_already_applied: unit_cfg.assume_applied,
                excluded: unit_cfg.exclude,
                options,
            })
        })
        .collect()
}
