// src/config/validate.rs

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::StackFile;
use crate::errors::RunError;
use crate::run::DependencyOrder;

/// Run semantic validation against a loaded stack file.
///
/// This checks:
/// - there is at least one unit
/// - `order` is a valid dependency direction
/// - `parallelism >= 1`
/// - all `after` dependencies refer to existing units
/// - no unit depends on itself
/// - the unit graph has no cycles
pub fn validate_stack(cfg: &StackFile) -> Result<()> {
    ensure_has_units(cfg)?;
    validate_global_config(cfg)?;
    validate_unit_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_units(cfg: &StackFile) -> Result<()> {
    if cfg.unit.is_empty() {
        return Err(anyhow!(
            "stack must contain at least one [unit.<name>] section"
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &StackFile) -> Result<()> {
    DependencyOrder::from_str(&cfg.config.order)
        .map_err(|e| anyhow!(e))
        .context("invalid [config].order")?;

    if cfg.config.parallelism == 0 {
        return Err(anyhow!("[config].parallelism must be >= 1 (got 0)"));
    }

    Ok(())
}

fn validate_unit_dependencies(cfg: &StackFile) -> Result<()> {
    for (name, unit) in cfg.unit.iter() {
        let unknown: Vec<String> = unit
            .after
            .iter()
            .filter(|dep| !cfg.unit.contains_key(*dep))
            .cloned()
            .collect();

        if !unknown.is_empty() {
            return Err(anyhow::Error::new(RunError::UnrecognizedDependencies {
                unit: name.clone(),
                dependencies: unknown,
            }));
        }

        if unit.after.iter().any(|dep| dep == name) {
            return Err(anyhow!("unit '{}' cannot depend on itself in `after`", name));
        }
    }
    Ok(())
}

fn validate_dag(cfg: &StackFile) -> Result<()> {
    // Edge direction: dep -> unit. For `[unit.app] after = ["vpc"]` we add
    // the edge vpc -> app; a topological sort fails iff there is a cycle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.unit.keys() {
        graph.add_node(name.as_str());
    }

    for (name, unit) in cfg.unit.iter() {
        for dep in unit.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(anyhow!(
            "cycle detected in unit graph involving unit '{}'",
            cycle.node_id()
        )),
    }
}
