//! The Tool Driver: one variant per supported simulator, each translating
//! the abstract operations {compile, elaborate, gen_image, simulate} into
//! concrete command lines, plus per-stage log-scanning patterns.
//!
//! Modeled as a sum type per spec.md §9 Design Notes, not a dispatch-by-
//! branch object with a shared mutable argument table — the pattern is the
//! same one the teacher's `cache::CacheSystem` and `linker::Linker` enums
//! use for their own backend-per-variant dispatch.

use std::path::Path;

use crate::paths::Layout;

/// The fixed set of supported simulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Simulator {
    Vivado,
    Metrics,
    Vcs,
    Xcelium,
    Questa,
    Riviera,
}

/// A stage within the compile/elaborate/simulate pipeline, used to select
/// the right default-argument table and regex set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Elaborate,
    Simulate,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Compile => "compilation",
            Stage::Elaborate => "elaboration",
            Stage::Simulate => "simulation",
        }
    }
}

impl Simulator {
    pub const ALL: [Simulator; 6] = [
        Simulator::Vivado,
        Simulator::Metrics,
        Simulator::Vcs,
        Simulator::Xcelium,
        Simulator::Questa,
        Simulator::Riviera,
    ];

    /// Fixed short codes used throughout on-disk paths and history keys.
    pub fn short_code(&self) -> &'static str {
        match self {
            Simulator::Vivado => "viv",
            Simulator::Metrics => "mdc",
            Simulator::Vcs => "vcs",
            Simulator::Xcelium => "xcl",
            Simulator::Questa => "qst",
            Simulator::Riviera => "riv",
        }
    }

    pub fn from_short_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.short_code() == code)
    }

    /// Accepts either the short code (`viv`) or the full name (`vivado`),
    /// case-insensitively, matching the flexibility CLI users expect from
    /// `-a/--app`.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| s.short_code() == lower || s.full_name() == lower)
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            Simulator::Vivado => "vivado",
            Simulator::Metrics => "metrics",
            Simulator::Vcs => "vcs",
            Simulator::Xcelium => "xcelium",
            Simulator::Questa => "questa",
            Simulator::Riviera => "riviera",
        }
    }

    /// Default arguments prepended to every invocation of `stage`, per the
    /// table in spec.md §4.3 (cross-checked against `eal.py`'s
    /// `*_default_*_args` constants).
    pub fn default_args(&self, stage: Stage) -> &'static [&'static str] {
        use Simulator::*;
        use Stage::*;
        match (self, stage) {
            (Vivado, Compile) => &["--incr", "-sv"],
            (Vivado, Elaborate) => {
                &["--incr", "-relax", "--O0", "-v", "0", "-dup_entity_as_module"]
            }
            (Vivado, Simulate) => &["--stats"],

            (Metrics, Compile) => &["-suppress", "MultiBlockWrite:..."],
            (Metrics, Elaborate) => &["+acc+b", "-suppress", "DupModuleDefn"],
            (Metrics, Simulate) => &[],

            (Vcs, Compile) => &["-lca", "-sverilog"],
            (Vcs, Elaborate) => &[],
            (Vcs, Simulate) => &[],

            (Xcelium, _) => &[],

            (Questa, Compile) => &["-64", "-incrcomp"],
            (Questa, Elaborate) => &["-64"],
            (Questa, Simulate) => &["-64", "-c"],

            (Riviera, _) => &[],
        }
    }

    /// Formats a library binding for a dependency `name` (vendor `vendor`)
    /// compiled into `cmp_out`, one call per dependency per
    /// `eal.py::convert_deps_to_args`: Metrics/Questa key by
    /// `vendor__name` alone, every other simulator by `name=cmp_out`.
    pub fn library_binding(&self, vendor: &str, name: &str, cmp_out: &Path) -> String {
        use Simulator::*;
        match self {
            Metrics | Questa => format!("-L {vendor}__{name}"),
            _ => format!("-L {name}={}", cmp_out.display()),
        }
    }

    /// The `-sv_seed` token, where the original's `do_simulate` appends
    /// one (Vivado/Metrics/Questa only; VCS/Xcelium/Riviera never set a
    /// seed argument in the source).
    pub fn seed_token(&self, seed: u32) -> Option<String> {
        use Simulator::*;
        match self {
            Vivado | Metrics | Questa => Some(format!("-sv_seed {seed}")),
            Vcs | Xcelium | Riviera => None,
        }
    }

    /// Waves-capture tokens for a simulate invocation, per
    /// `do_simulate`'s `if sim_job.waves:` branch. Only Vivado and
    /// Metrics implement this in the source; the rest are `# TODO`
    /// there and stay unimplemented here too.
    pub fn waves_args(&self, results_dir: &Path, result_dir_name: &str) -> Option<Vec<String>> {
        use Simulator::*;
        match self {
            Vivado => {
                let waves_path = results_dir.join("waves.wdb");
                let tcl_path = results_dir.join("waves.viv.tcl");
                Some(vec![
                    format!("--wdb {}", waves_path.display()),
                    format!("--tclbatch {}", tcl_path.display()),
                ])
            }
            Metrics => Some(vec![format!("-waves {result_dir_name}.vcd")]),
            // TODO: waves flag wiring for vcs/xcelium/questa/riviera — the
            // source itself leaves these branches as `pass`.
            Vcs | Xcelium | Questa | Riviera => None,
        }
    }

    /// Coverage tokens for a simulate invocation, per `do_simulate`'s `if
    /// sim_job.cov:` branch. Only Vivado and Metrics implement this in
    /// the source.
    pub fn cov_args(&self, cov_path: &Path, test_name: &str, result_dir_name: &str) -> Option<Vec<String>> {
        use Simulator::*;
        match self {
            Vivado => Some(vec![
                format!("-cov_db_name {test_name}"),
                format!("-cov_db_dir {}", cov_path.display()),
            ]),
            Metrics => Some(vec!["-code-cov a".to_string(), format!("-cov-db {result_dir_name}")]),
            // TODO: coverage flag wiring for vcs/xcelium/questa/riviera —
            // the source itself leaves these branches as `pass`.
            Vcs | Xcelium | Questa | Riviera => None,
        }
    }

    /// Formats one `+define+NAME[=VALUE]`-family token.
    pub fn define_token(&self, name: &str, value: Option<&str>) -> String {
        match self {
            Simulator::Vivado => match value {
                Some(v) => format!("--define {name}={v}"),
                None => format!("--define {name}"),
            },
            _ => match value {
                Some(v) => format!("+define+{name}={v}"),
                None => format!("+define+{name}"),
            },
        }
    }

    /// Formats one plus-arg token (`+NAME[=VALUE]` family).
    pub fn plusarg_token(&self, name: &str, value: Option<&str>) -> String {
        match self {
            Simulator::Vivado => match value {
                Some(v) => format!("-testplusarg \"{name}={v}\""),
                None => format!("-testplusarg \"{name}\""),
            },
            _ => match value {
                Some(v) => format!("+{name}={v}"),
                None => format!("+{name}"),
            },
        }
    }

    /// The flag that introduces a filelist argument. Vivado spells it
    /// `-F`; every other simulator uses the conventional `-f`.
    pub fn filelist_flag(&self) -> &'static str {
        match self {
            Simulator::Vivado => "-F",
            _ => "-f",
        }
    }

    /// Formats the log-output flag for `stage`, or `None` when the
    /// simulator captures its log purely via stdout redirection.
    pub fn log_flag(&self, stage: Stage, log_path: &Path) -> Option<String> {
        use Simulator::*;
        match self {
            Vivado => Some(format!("--log {}", log_path.display())),
            Metrics => log_path.file_name().map(|n| format!("-l {}", n.to_string_lossy())),
            Vcs => Some(format!("-l {}", log_path.display())),
            Questa => Some(format!("-l {}", log_path.display())),
            Xcelium | Riviera => None,
        }
    }

    /// Substrings that mark an error within a stage's log, in source order.
    /// These are plain substrings, not compiled regexes: several of the
    /// original patterns (e.g. xcelium's `*E `) are not valid regular
    /// expressions, only grep-style literal markers, so `str::contains` is
    /// both correct and panic-free where a literal `Regex::new` would not
    /// be.
    pub fn error_markers(&self, stage: Stage) -> &'static [&'static str] {
        use Simulator::*;
        use Stage::*;
        match (self, stage) {
            (Vivado, Compile) => &["ERROR:"],
            (Vivado, Elaborate) => &["ERROR:", "Invalid path for DPI library:"],
            (Vivado, Simulate) => &["ERROR:"],

            (Metrics, _) => &["=E:", "=F:"],

            (Vcs, _) => &["Error-"],

            (Xcelium, _) => &["*E "],

            (Questa, _) => &["** Error:"],

            (Riviera, _) => &["Error:"],
        }
    }

    /// Substrings that mark a warning within a stage's log.
    pub fn warning_markers(&self, stage: Stage) -> &'static [&'static str] {
        use Simulator::*;
        match (self, stage) {
            (Vivado, _) => &["WARNING:"],
            (Metrics, _) => &["=W:"],
            (Vcs, _) => &["Warning-"],
            (Xcelium, _) => &["*W "],
            (Questa, _) => &["** Warning:"],
            (Riviera, _) => &["Warning:"],
        }
    }

    /// The simulator's notion of a "gen-image" fused compile+elaborate
    /// step exists only for the cloud (Metrics) backend; all others
    /// separate the stages.
    pub fn supports_gen_image(&self) -> bool {
        matches!(self, Simulator::Metrics)
    }

    /// Scan `log_path` line by line against this stage's error markers,
    /// returning each matching line with its trailing newline stripped.
    pub fn scan_log(&self, log_path: &Path, stage: Stage) -> crate::error::Result<Vec<String>> {
        let markers = self.error_markers(stage);
        let contents = std::fs::read_to_string(log_path)?;
        Ok(contents
            .lines()
            .filter(|line| markers.iter().any(|m| line.contains(m)))
            .map(|line| line.trim_end_matches('\n').to_string())
            .collect())
    }
}

/// Error returned by [`Simulator::from_str`] for an unrecognized name; a
/// distinct type (rather than a bare `String`) so it implements
/// `std::error::Error`, which `clap`'s derive macro requires of a value
/// parser's error type.
#[derive(Debug, thiserror::Error)]
#[error("unknown simulator '{0}'")]
pub struct UnknownSimulator(String);

impl std::str::FromStr for Simulator {
    type Err = UnknownSimulator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Simulator::from_name(s).ok_or_else(|| UnknownSimulator(s.to_string()))
    }
}

impl std::fmt::Display for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// The on-disk working directories a given simulator uses for one IP's
/// compile stage, rooted at `layout`.
pub fn compile_work_dirs(
    layout: &Layout,
    sim: Simulator,
    vendor: &str,
    name: &str,
) -> (std::path::PathBuf, std::path::PathBuf) {
    (layout.cmp_out_dir(sim, vendor, name), layout.cmp_wd_dir(sim, vendor, name))
}
