// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Top-level stack definition as read from a TOML file.
///
/// ```toml
/// [config]
/// parallelism = 4
/// order = "normal"
///
/// [default]
/// program = "terraform"
///
/// [unit.vpc]
/// path = "network/vpc"
///
/// [unit.app]
/// after = ["vpc"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct StackFile {
    /// Run-control settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Defaults applied to units that do not override them, from
    /// `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// All units from `[unit.<name>]`, keyed by unit name.
    #[serde(default)]
    pub unit: BTreeMap<String, UnitConfig>,
}

impl StackFile {
    /// Resolve a unit name to its effective path (the configured `path`,
    /// or the name itself when no path is set).
    pub fn unit_path(&self, name: &str) -> String {
        self.unit
            .get(name)
            .and_then(|unit| unit.path.clone())
            .unwrap_or_else(|| name.to_string())
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of units running concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Dependency direction: `"normal"`, `"reverse"`, or `"ignore"`.
    #[serde(default = "default_order")]
    pub order: String,

    /// Keep running units whose dependencies failed.
    #[serde(default)]
    pub ignore_dependency_errors: bool,

    /// Record per-unit outcomes and print a summary after the run.
    #[serde(default)]
    pub report: bool,

    /// Copy unit stdout to the terminal verbatim instead of echoing it
    /// through the debug log.
    #[serde(default)]
    pub forward_stdout: bool,

    /// Directory plan files are saved under, one subdirectory per unit.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,

    /// Directory JSON-rendered plans are written under. Setting this
    /// enables the JSON capture step after each successful run.
    #[serde(default)]
    pub json_out_dir: Option<PathBuf>,
}

fn default_parallelism() -> usize {
    4
}

fn default_order() -> String {
    "normal".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            order: default_order(),
            ignore_dependency_errors: false,
            report: false,
            forward_stdout: false,
            out_dir: None,
            json_out_dir: None,
        }
    }
}

/// `[default]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    /// Program invoked for units that do not set their own.
    #[serde(default)]
    pub program: Option<String>,
}

/// `[unit.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UnitConfig {
    /// Directory of the unit, relative to the stack file. Defaults to the
    /// unit's name.
    #[serde(default)]
    pub path: Option<String>,

    /// Names of the units this unit depends on.
    #[serde(default)]
    pub after: Vec<String>,

    /// Program override for this unit.
    #[serde(default)]
    pub program: Option<String>,

    /// Treat this unit as already applied: skip its command but satisfy
    /// its dependents.
    #[serde(default)]
    pub assume_applied: bool,

    /// Exclude this unit (and edges to it) from the run.
    #[serde(default)]
    pub exclude: bool,
}
