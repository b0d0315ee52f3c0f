//! Process-wide immutable configuration: project root, tool-home paths per
//! simulator, default simulator, UVM location, timescale, and the
//! templates directory the Filelist Synthesizer loads from.
//!
//! Layered the way the teacher's `config_fixed` module layers its own
//! settings: built-in defaults, then an optional project TOML file, then
//! environment variables, via `figment`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simulator::Simulator;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load configuration: {0}")]
    Figment(#[from] figment::Error),
}

/// Project-local configuration file name, read from the project root.
pub const CONFIG_FILE_NAME: &str = "mio.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the project tree being built; all other paths are relative
    /// to this unless explicitly absolute.
    pub project_root: PathBuf,

    /// Simulator used when a command omits `--simulator`.
    pub default_simulator: Simulator,

    /// Per-simulator installation home. A simulator with no entry here is
    /// reported as `SimulatorNotInstalled` the first time it is needed.
    pub tool_homes: HashMap<Simulator, PathBuf>,

    /// UVM source tree, needed only when targeting Questa (spec.md §4.4:
    /// `MIO_UVM_HOME` is set for every Questa invocation).
    pub uvm_home: Option<PathBuf>,

    /// UVM version string embedded in generated filelists and logs.
    pub uvm_version: String,

    /// Default `timescale` directive applied to generated filelists.
    pub timescale: String,

    /// Glob root the Filelist Synthesizer loads `*.flist.j2` /
    /// `*.mflist.j2` templates from.
    pub templates_dir: PathBuf,

    /// Directory holding the global (cross-project) IP install cache.
    pub global_ip_cache_dir: PathBuf,

    /// Upper bound on concurrent simulation jobs when a regression does
    /// not specify its own `max_jobs`.
    pub default_max_jobs: usize,
}

impl Config {
    /// Load configuration for `project_root`: built-in defaults, then
    /// `<project_root>/mio.toml` if present, then `MIO_*` environment
    /// variables, each layer overriding the last.
    pub fn load(project_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let project_root = project_root.into();
        let defaults = Config::defaults_for(&project_root);
        let config_path = project_root.join(CONFIG_FILE_NAME);

        let figment = Figment::from(Serialized::defaults(&defaults))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("MIO_").split("_"));

        let config: Config = figment.extract()?;
        Ok(config)
    }

    fn defaults_for(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            default_simulator: Simulator::Questa,
            tool_homes: HashMap::new(),
            uvm_home: None,
            uvm_version: "1.2".to_string(),
            timescale: "1ns/1ps".to_string(),
            templates_dir: project_root.join("templates"),
            global_ip_cache_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".mio")
                .join("cache"),
            default_max_jobs: 4,
        }
    }

    /// The configured home for `sim`, if any.
    pub fn tool_home(&self, sim: Simulator) -> Option<&Path> {
        self.tool_homes.get(&sim).map(PathBuf::as_path)
    }

    /// Whether `sim`'s binaries can be located at all: either an explicit
    /// tool home was configured, or the short-named binaries resolve on
    /// `PATH` (checked lazily by callers via `which`).
    pub fn has_explicit_tool_home(&self, sim: Simulator) -> bool {
        self.tool_homes.contains_key(&sim)
    }
}

// `figment::providers::Env` keys on a serializable type; `Simulator` needs
// to serialize as a plain string so `MIO_TOOL_HOMES_QUESTA=/opt/questa`
// style overrides are representable. Map keys round-trip as their
// `short_code()` both ways.
impl Serialize for Simulator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.short_code())
    }
}

impl<'de> Deserialize<'de> for Simulator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = String::deserialize(deserializer)?;
        Simulator::from_short_code(&code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown simulator '{code}'")))
    }
}
