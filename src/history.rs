//! The Job History Store: a durable, per-project record of every compile,
//! elaborate, gen-image, and simulate operation, keyed by IP identifier.
//!
//! Grounded in the history-reading/writing calls threaded through
//! `sim.py::main` (loaded at start, appended to on each successful stage,
//! flushed before exit) and `sim.py`'s repeated
//! `est_time = math.ceil(est_time / len(records))` duration-estimate
//! pattern, generalized here from whole minutes to whole seconds per
//! spec.md §4.5.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d-%H:%M:%S";

/// Regression working/results directory name format (spec.md §6), distinct
/// from the history-record timestamp format above.
pub const DIRNAME_TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compilation,
    Elaboration,
    Simulation,
    GenImage,
}

/// One completed operation. Simulation-only fields are `None` for
/// compile/elaborate/gen-image records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub simulator: String,
    pub start: String,
    pub end: String,
    pub cmp_log_path: Option<PathBuf>,
    pub elab_log_path: Option<PathBuf>,
    pub sim_log_path: Option<PathBuf>,
    pub test_name: Option<String>,
    pub seed: Option<u32>,
    pub plus_args: Option<String>,
    pub waves: Option<bool>,
    pub cov: Option<bool>,
    pub gui: Option<bool>,
    pub results_path: Option<PathBuf>,
    pub regression_name: Option<String>,
    pub regression_timestamp: Option<String>,
}

impl HistoryRecord {
    pub fn duration_seconds(&self) -> Option<i64> {
        let start = NaiveDateTime::parse_from_str(&self.start, TIMESTAMP_FORMAT).ok()?;
        let end = NaiveDateTime::parse_from_str(&self.end, TIMESTAMP_FORMAT).ok()?;
        Some((end - start).num_seconds())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpHistory {
    #[serde(default)]
    pub compilation: Vec<HistoryRecord>,
    #[serde(default)]
    pub elaboration: Vec<HistoryRecord>,
    #[serde(default)]
    pub simulation: Vec<HistoryRecord>,
    #[serde(default, rename = "gen-image")]
    pub gen_image: Vec<HistoryRecord>,
}

impl IpHistory {
    fn records(&self, stage: Stage) -> &[HistoryRecord] {
        match stage {
            Stage::Compilation => &self.compilation,
            Stage::Elaboration => &self.elaboration,
            Stage::Simulation => &self.simulation,
            Stage::GenImage => &self.gen_image,
        }
    }

    fn records_mut(&mut self, stage: Stage) -> &mut Vec<HistoryRecord> {
        match stage {
            Stage::Compilation => &mut self.compilation,
            Stage::Elaboration => &mut self.elaboration,
            Stage::Simulation => &mut self.simulation,
            Stage::GenImage => &mut self.gen_image,
        }
    }
}

/// The full on-disk history tree: IP identifier (`<vendor>/<name>` or a
/// FuseSoC core name) to its four stage record lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobHistory {
    #[serde(flatten)]
    entries: HashMap<String, IpHistory>,
}

impl JobHistory {
    /// Loads the history tree from `path`, or returns an empty tree if the
    /// file does not exist yet (first run in a project).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Atomically persists the history tree: write to a sibling temp file,
    /// then rename over the destination, so a crash mid-write never
    /// leaves a truncated `job_history.json`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = tempfile::NamedTempFile::new_in(path.parent().unwrap_or(Path::new(".")))?;
        serde_json::to_writer_pretty(&tmp, self)?;
        tmp.persist(path).map_err(|e| crate::error::Error::io_failure(e.to_string()))?;
        Ok(())
    }

    pub fn record(&mut self, ip_identifier: &str, stage: Stage, record: HistoryRecord) {
        self.entries.entry(ip_identifier.to_string()).or_default().records_mut(stage).push(record);
    }

    /// Arithmetic mean of (end - start) over every prior record for
    /// `ip_identifier` at `stage`, rounded up to the nearest second; 0 if
    /// there are no records yet.
    pub fn estimate_seconds(&self, ip_identifier: &str, stage: Stage) -> u64 {
        let Some(history) = self.entries.get(ip_identifier) else { return 0 };
        let durations: Vec<i64> =
            history.records(stage).iter().filter_map(HistoryRecord::duration_seconds).collect();
        if durations.is_empty() {
            return 0;
        }
        let total: i64 = durations.iter().sum();
        let mean = total as f64 / durations.len() as f64;
        mean.ceil().max(0.0) as u64
    }

    pub fn now_timestamp() -> String {
        Local::now().format(TIMESTAMP_FORMAT).to_string()
    }

    /// `YYYY_MM_DD_HH_MM_SS`, used for regression working/results directory
    /// names (spec.md §6).
    pub fn now_timestamp_dirname() -> String {
        Local::now().format(DIRNAME_TIMESTAMP_FORMAT).to_string()
    }

    /// All simulation records for `ip_identifier`, in append order; empty
    /// if the IP has no history yet. Used by the Results collaborator
    /// contract (`results.rs`) to replay what the pipeline recorded.
    pub fn simulation_records(&self, ip_identifier: &str) -> &[HistoryRecord] {
        self.entries.get(ip_identifier).map(|h| h.simulation.as_slice()).unwrap_or(&[])
    }

    /// All records for `ip_identifier` at `stage`, in append order; empty
    /// if the IP has no history yet. Generalizes `simulation_records` to
    /// every stage.
    pub fn records(&self, ip_identifier: &str, stage: Stage) -> &[HistoryRecord] {
        self.entries.get(ip_identifier).map(|h| h.records(stage)).unwrap_or(&[])
    }
}
