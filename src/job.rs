//! The Simulation Job Orchestrator: drives exactly the stages one
//! `SimulationJob` requests against its target IP, consulting the cache,
//! the job history store, and the tool driver along the way.
//!
//! The eight-step algorithm below is `sim.py::main(sim_job)` reproduced
//! step for step; `print_end_of_*_message` becomes [`print_stage_summary`]
//! and `progress_bar()`/`kill_progress_bar()` become the teacher's
//! `old_modules::utils::create_progress_bar`.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::cache::IpCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::filelist::FilelistSynthesizer;
use crate::history::{HistoryRecord, JobHistory, Stage as HistoryStage};
use crate::ip::{DependencyEdge, DutBinding, IpId};
use crate::paths::Layout;
use crate::process;
use crate::simulator::{Simulator, Stage as ToolStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    None,
    Low,
    Medium,
    High,
    Debug,
}

impl Verbosity {
    /// Parses the `cli.uvm_levels`-style verbosity name used in suite
    /// descriptors and CLI `-v` arguments; unrecognized names fall back to
    /// `Medium`, matching the original's default UVM verbosity.
    pub fn parse(name: &str) -> Verbosity {
        match name.to_ascii_lowercase().as_str() {
            "none" => Verbosity::None,
            "low" => Verbosity::Low,
            "medium" => Verbosity::Medium,
            "high" => Verbosity::High,
            "debug" => Verbosity::Debug,
            _ => Verbosity::Medium,
        }
    }

    /// The `UVM_<LEVEL>` suffix `do_simulate` assigns to the
    /// `UVM_VERBOSITY` plus-arg.
    pub fn uvm_name(&self) -> &'static str {
        match self {
            Verbosity::None => "NONE",
            Verbosity::Low => "LOW",
            Verbosity::Medium => "MEDIUM",
            Verbosity::High => "HIGH",
            Verbosity::Debug => "DEBUG",
        }
    }
}

/// One requested invocation of the pipeline against a target IP.
#[derive(Debug, Clone)]
pub struct SimulationJob {
    pub target_vendor: Option<String>,
    pub target_name: String,
    pub simulator: Simulator,
    pub compile: bool,
    pub elaborate: bool,
    pub simulate: bool,
    pub test_name: Option<String>,
    pub seed: u32,
    pub verbosity: Verbosity,
    pub max_errors: u32,
    pub waves: bool,
    pub cov: bool,
    pub gui: bool,
    pub dry_run: bool,
    pub is_regression: bool,
    pub fsoc: bool,
    pub raw_args: Vec<String>,
    pub cmp_args: HashMap<String, String>,
    pub sim_args: HashMap<String, String>,
    pub regression_name: Option<String>,
    pub regression_timestamp: Option<String>,
}

impl SimulationJob {
    /// `seed` must fall in `[1, 2^31 - 2]`, matching the original's
    /// `random.randint(1, 2147483646)` range.
    pub fn validate(&self) -> Result<()> {
        if self.seed == 0 || self.seed > 2_147_483_646 {
            return Err(Error::other(format!("seed {} is out of range [1, 2147483646]", self.seed)));
        }
        if self.is_regression && (self.regression_name.is_none() || self.regression_timestamp.is_none())
        {
            return Err(Error::other(
                "a regression job must carry both regression_name and regression_timestamp",
            ));
        }
        Ok(())
    }
}

fn define_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+define\+([A-Za-z_][A-Za-z0-9_]*)(?:=(.*))?$").unwrap())
}

fn plusarg_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+([A-Za-z_][A-Za-z0-9_]*)(?:=(.*))?$").unwrap())
}

/// Tokens matching `+define+N[=V]` populate `cmp_args`; other `+N[=V]`
/// tokens populate `sim_args`. Malformed tokens are silently dropped
/// after a debug log line, matching
/// `convert_cli_args_to_defines`/`convert_cli_args_to_plusargs` in
/// `sim.py`.
pub fn parse_raw_args(raw_args: &[String]) -> (HashMap<String, String>, HashMap<String, String>) {
    let mut cmp_args = HashMap::new();
    let mut sim_args = HashMap::new();

    for token in raw_args {
        if let Some(caps) = define_pattern().captures(token) {
            let name = caps[1].to_string();
            let value = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
            cmp_args.insert(name, value);
        } else if let Some(caps) = plusarg_pattern().captures(token) {
            let name = caps[1].to_string();
            let value = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
            sim_args.insert(name, value);
        } else {
            debug!("dropping malformed raw arg: {token}");
        }
    }

    (cmp_args, sim_args)
}

pub struct Orchestrator<'a> {
    pub config: &'a Config,
    pub layout: &'a Layout,
    pub cache: &'a mut IpCache,
    pub history: &'a mut JobHistory,
    pub filelist: &'a FilelistSynthesizer,
}

impl<'a> Orchestrator<'a> {
    /// Runs the eight-step algorithm of spec.md §4.6 for `job`.
    pub fn run(&mut self, job: &mut SimulationJob) -> Result<()> {
        job.validate()?;

        // Step 1: resolve the IP.
        let target_id = self.resolve_target(job)?;

        // Step 2: verify the simulator is installed.
        self.ensure_simulator_installed(job.simulator)?;

        // Step 3: Metrics workspace init (idempotent).
        if job.simulator == Simulator::Metrics {
            self.ensure_metrics_workspace()?;
        }

        // Step 4: parse raw args.
        let (cmp_args, sim_args) = parse_raw_args(&job.raw_args);
        job.cmp_args.extend(cmp_args);
        job.sim_args.extend(sim_args);

        // Step 5: create the fixed output-directory layout.
        self.layout.ensure_all()?;

        // Step 6: compile.
        if job.compile {
            self.compile_stage(job, target_id)?;
        }

        // Step 7: elaborate, if requested and invalidated or never done.
        if job.elaborate {
            let needs_elab = job.compile || !self.cache.get_by_id(target_id).elaborated.get(job.simulator);
            if needs_elab {
                self.elaborate_stage(job, target_id)?;
            }
        }

        // Step 8: simulate.
        if job.simulate {
            self.simulate_stage(job, target_id)?;
            print_stage_summary(&self.cache.get_by_id(target_id).identifier(), "simulation", job);
        }

        Ok(())
    }

    fn resolve_target(&self, job: &SimulationJob) -> Result<IpId> {
        match &job.target_vendor {
            Some(v) => self.cache.get(Some(v), &job.target_name, true)?.ok_or_else(|| {
                Error::not_found(format!("{v}/{}", job.target_name))
            }),
            None => self.cache.get_anon(&job.target_name, true)?.ok_or_else(|| {
                Error::not_found(job.target_name.clone())
            }),
        }
    }

    fn ensure_simulator_installed(&self, sim: Simulator) -> Result<()> {
        match self.config.tool_home(sim) {
            Some(home) if home.exists() => Ok(()),
            Some(_) => Err(Error::simulator_not_installed(sim.short_code())),
            None if which::which(sim.short_code()).is_ok() => Ok(()),
            None => Err(Error::simulator_not_installed(sim.short_code())),
        }
    }

    fn ensure_metrics_workspace(&self) -> Result<()> {
        let marker = self.layout.metrics_workspace_marker();
        if marker.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&marker)?;
        Ok(())
    }

    /// Step 6: install-state check, then topological dependency compile,
    /// DUT compile, target compile. Installing a missing dependency is a
    /// collaborator concern (spec.md §1 excludes marketplace fetch/install
    /// from this crate's scope); this stage only detects the need and
    /// fails, whether or not a TTY is attached.
    fn compile_stage(&mut self, job: &SimulationJob, target_id: IpId) -> Result<()> {
        let missing = self.cache.get_deps_to_install(target_id);
        if !missing.is_empty() {
            return Err(Error::missing_dependencies(missing));
        }

        let deps = self.cache.ordered_deps(target_id)?;
        for dep_id in deps {
            if !self.cache.get_by_id(dep_id).compiled.get(job.simulator) {
                self.compile_one(job, dep_id)?;
            }
        }

        if let Some(DutBinding::Ip(DependencyEdge::Resolved(dut_id))) = self.cache.get_by_id(target_id).dut.clone()
        {
            if !self.cache.get_by_id(dut_id).compiled.get(job.simulator) {
                self.compile_one(job, dut_id)?;
            }
        }

        if !self.cache.get_by_id(target_id).compiled.get(job.simulator) {
            self.compile_one(job, target_id)?;
        }
        print_stage_summary(&self.cache.get_by_id(target_id).identifier(), "compilation", job);
        Ok(())
    }

    fn compile_one(&mut self, job: &SimulationJob, ip_id: IpId) -> Result<()> {
        let identifier = self.cache.get_by_id(ip_id).identifier();
        let estimate = self.history.estimate_seconds(&identifier, HistoryStage::Compilation);
        let progress = create_progress_bar(estimate.max(1), &format!("compiling {identifier}"));

        let cmp_log = self.layout.cmp_log_path(
            self.cache.get_by_id(ip_id).vendor.as_deref().unwrap_or(""),
            &self.cache.get_by_id(ip_id).name,
            job.simulator,
        );

        let start = JobHistory::now_timestamp();
        let mut env = HashMap::new();
        env.insert(
            format!("MIO_{}_SRC_PATH", self.cache.get_by_id(ip_id).name.to_uppercase()),
            self.cache.get_by_id(ip_id).source_path.to_string_lossy().into_owned(),
        );
        if job.simulator == Simulator::Questa {
            if let Some(uvm_home) = &self.config.uvm_home {
                env.insert("MIO_UVM_HOME".to_string(), uvm_home.to_string_lossy().into_owned());
            }
        }

        let vendor = self.cache.get_by_id(ip_id).vendor.clone().unwrap_or_default();
        let name = self.cache.get_by_id(ip_id).name.clone();
        let flist_out = self.layout.filelist_path(job.simulator, &vendor, &name);
        let flist_path = self.filelist.synthesize(
            self.cache.get_by_id(ip_id),
            job.simulator,
            job,
            &self.config.project_root,
            self.config.uvm_home.as_deref(),
            &flist_out,
        )?;

        let bindings = self.dependency_bindings(ip_id, job.simulator)?;
        let args = assemble_stage_args_with_filelist(
            job,
            ToolStage::Compile,
            &cmp_log,
            Some(&flist_path),
            &bindings,
        );
        let wd = self.layout.cmp_wd_dir(job.simulator, &vendor, &name);

        process::launch(job.simulator.short_code(), &args, &wd, &env, false, job.dry_run)?;
        progress.finish_and_clear();

        if !job.dry_run {
            let errors = job.simulator.scan_log(&cmp_log, ToolStage::Compile)?;
            if !errors.is_empty() {
                return Err(Error::tool_failure(identifier, "compilation", cmp_log, errors));
            }
            self.cache.get_by_id_mut(ip_id).compiled.set(job.simulator, true);

            self.history.record(
                &identifier,
                HistoryStage::Compilation,
                HistoryRecord {
                    simulator: job.simulator.short_code().to_string(),
                    start,
                    end: JobHistory::now_timestamp(),
                    cmp_log_path: Some(cmp_log),
                    elab_log_path: None,
                    sim_log_path: None,
                    test_name: None,
                    seed: None,
                    plus_args: None,
                    waves: None,
                    cov: None,
                    gui: None,
                    results_path: None,
                    regression_name: job.regression_name.clone(),
                    regression_timestamp: job.regression_timestamp.clone(),
                },
            );
        }

        Ok(())
    }

    /// One `-L` binding per transitive dependency of `ip_id` (excluding
    /// `uvm`), per `eal.py::convert_deps_to_args`.
    fn dependency_bindings(&self, ip_id: IpId, sim: Simulator) -> Result<Vec<String>> {
        let bindings = self
            .cache
            .ordered_deps(ip_id)?
            .into_iter()
            .map(|dep_id| {
                let dep = self.cache.get_by_id(dep_id);
                let vendor = dep.vendor.as_deref().unwrap_or("");
                let cmp_out = self.layout.cmp_out_dir(sim, vendor, &dep.name);
                sim.library_binding(vendor, &dep.name, &cmp_out)
            })
            .collect();
        Ok(bindings)
    }

    fn elaborate_stage(&mut self, job: &SimulationJob, target_id: IpId) -> Result<()> {
        let identifier = self.cache.get_by_id(target_id).identifier();
        let elab_log = self.layout.elab_log_path(
            self.cache.get_by_id(target_id).vendor.as_deref().unwrap_or(""),
            &self.cache.get_by_id(target_id).name,
            job.simulator,
        );
        let start = JobHistory::now_timestamp();

        let mut dependency_filelists = Vec::new();
        for dep_id in self.cache.ordered_deps(target_id)? {
            let dep = self.cache.get_by_id(dep_id);
            let vendor = dep.vendor.as_deref().unwrap_or("");
            dependency_filelists.push(self.layout.filelist_path(job.simulator, vendor, &dep.name));
        }
        let target = self.cache.get_by_id(target_id);
        let target_vendor = target.vendor.as_deref().unwrap_or("");
        dependency_filelists.push(self.layout.filelist_path(job.simulator, target_vendor, &target.name));

        let master_out = self.layout.master_filelist_path(job.simulator, target_vendor, &target.name);
        let master_path = self.filelist.synthesize_master(target, &dependency_filelists, job.simulator, &master_out)?;

        // `do_elaborate` appends the dependency bindings first, then the
        // IP's own binding to its just-compiled library.
        let mut bindings = self.dependency_bindings(target_id, job.simulator)?;
        let target = self.cache.get_by_id(target_id);
        let own_vendor = target.vendor.as_deref().unwrap_or("").to_string();
        let own_name = target.name.clone();
        let own_cmp_out = self.layout.cmp_out_dir(job.simulator, &own_vendor, &own_name);
        bindings.push(job.simulator.library_binding(&own_vendor, &own_name, &own_cmp_out));

        let args = assemble_stage_args_with_filelist(
            job,
            ToolStage::Elaborate,
            &elab_log,
            Some(&master_path),
            &bindings,
        );
        let wd = if job.is_regression {
            self.layout.regression_elab_dir(
                job.simulator,
                self.cache.get_by_id(target_id).vendor.as_deref().unwrap_or(""),
                &self.cache.get_by_id(target_id).name,
                job.regression_name.as_deref().unwrap_or("regression"),
            )
        } else {
            self.layout.single_sim_elab_dir(
                job.simulator,
                self.cache.get_by_id(target_id).vendor.as_deref().unwrap_or(""),
                &self.cache.get_by_id(target_id).name,
            )
        };

        process::launch(job.simulator.short_code(), &args, &wd, &HashMap::new(), false, job.dry_run)?;

        if !job.dry_run {
            let errors = job.simulator.scan_log(&elab_log, ToolStage::Elaborate)?;
            if !errors.is_empty() {
                return Err(Error::tool_failure(identifier.clone(), "elaboration", elab_log, errors));
            }
            self.cache.get_by_id_mut(target_id).elaborated.set(job.simulator, true);

            self.history.record(
                &identifier,
                HistoryStage::Elaboration,
                HistoryRecord {
                    simulator: job.simulator.short_code().to_string(),
                    start,
                    end: JobHistory::now_timestamp(),
                    cmp_log_path: None,
                    elab_log_path: Some(elab_log),
                    sim_log_path: None,
                    test_name: None,
                    seed: None,
                    plus_args: None,
                    waves: None,
                    cov: None,
                    gui: None,
                    results_path: None,
                    regression_name: job.regression_name.clone(),
                    regression_timestamp: job.regression_timestamp.clone(),
                },
            );
        }
        print_stage_summary(&identifier, "elaboration", job);
        Ok(())
    }

    fn simulate_stage(&mut self, job: &SimulationJob, target_id: IpId) -> Result<()> {
        let ip = self.cache.get_by_id(target_id);
        let identifier = ip.identifier();
        let ip_name = ip.name.clone();
        let test_name = render_test_name(ip, job.test_name.as_deref().unwrap_or(&ip_name));
        let result_dir_name = test_result_dir_name(&ip_name, &test_name, job.seed, &job.raw_args);

        let results_path = if job.is_regression {
            self.layout
                .regr_results_dir()
                .join(format!("{}_{}", ip_name, job.regression_name.as_deref().unwrap_or("regression")))
                .join(job.regression_timestamp.as_deref().unwrap_or_default())
                .join(&result_dir_name)
        } else {
            self.layout.sim_results_dir().join(&result_dir_name)
        };
        std::fs::create_dir_all(&results_path)?;
        std::fs::create_dir_all(results_path.join("trn_log"))?;

        let sim_log = results_path.join("sim.log");
        let start = JobHistory::now_timestamp();

        let args = build_simulate_args(ip, job, &sim_log, &results_path, &result_dir_name)?;
        let wd = self.layout.sim_output_dir();

        process::launch(job.simulator.short_code(), &args, &wd, &HashMap::new(), job.gui, job.dry_run)?;

        if !job.dry_run {
            self.history.record(
                &identifier,
                HistoryStage::Simulation,
                HistoryRecord {
                    simulator: job.simulator.short_code().to_string(),
                    start,
                    end: JobHistory::now_timestamp(),
                    cmp_log_path: None,
                    elab_log_path: None,
                    sim_log_path: Some(sim_log),
                    test_name: Some(test_name),
                    seed: Some(job.seed),
                    plus_args: Some(plus_args_string(&job.sim_args)),
                    waves: Some(job.waves),
                    cov: Some(job.cov),
                    gui: Some(job.gui),
                    results_path: Some(results_path),
                    regression_name: job.regression_name.clone(),
                    regression_timestamp: job.regression_timestamp.clone(),
                },
            );
        }
        Ok(())
    }

}

/// Assembles one stage's full argument vector: default args, define/plus-arg
/// tokens from the job's parsed maps, and the log flag. A free function
/// (not an `Orchestrator` method) so the Regression Scheduler's per-test
/// workers can build simulate-stage arguments against a read-only, shared
/// `Ip` reference without needing the `&mut IpCache` an `Orchestrator`
/// carries for its compile/elaborate steps.
pub(crate) fn assemble_stage_args(
    job: &SimulationJob,
    stage: ToolStage,
    log_path: &std::path::Path,
) -> Vec<String> {
    assemble_stage_args_with_filelist(job, stage, log_path, None, &[])
}

/// As [`assemble_stage_args`], additionally prepending a `-f`/`-F
/// <filelist>` token when `filelist_path` is given and appending
/// `library_bindings` verbatim. Compile and elaborate stages pass the
/// filelist the Filelist Synthesizer just produced, plus one `-L` binding
/// per dependency (and, for elaborate, the IP's own binding too); simulate
/// passes neither — spec.md §4.3's argument table has no filelist row for
/// the simulate stage (the elaborated image already embeds the source
/// set), and `do_simulate` never calls `convert_deps_to_args` at all.
pub(crate) fn assemble_stage_args_with_filelist(
    job: &SimulationJob,
    stage: ToolStage,
    log_path: &std::path::Path,
    filelist_path: Option<&std::path::Path>,
    library_bindings: &[String],
) -> Vec<String> {
    let mut args: Vec<String> = job.simulator.default_args(stage).iter().map(|s| s.to_string()).collect();

    if let Some(flist) = filelist_path {
        args.push(job.simulator.filelist_flag().to_string());
        args.push(flist.display().to_string());
    }

    // Elaborate reuses the compile-derived defines: the original has no
    // independent elaboration-args concept (`convert_defines` always reads
    // `sim_job.cmp_args`, for both `compile_flist` and `do_elaborate`).
    let args_map = match stage {
        ToolStage::Compile | ToolStage::Elaborate => &job.cmp_args,
        ToolStage::Simulate => &job.sim_args,
    };
    for (name, value) in args_map {
        let token = match stage {
            ToolStage::Simulate => {
                if value.is_empty() {
                    job.simulator.plusarg_token(name, None)
                } else {
                    job.simulator.plusarg_token(name, Some(value))
                }
            }
            ToolStage::Compile | ToolStage::Elaborate => {
                if value.is_empty() {
                    job.simulator.define_token(name, None)
                } else {
                    job.simulator.define_token(name, Some(value))
                }
            }
        };
        args.push(token);
    }

    if let Some(log_flag) = job.simulator.log_flag(stage, log_path) {
        args.push(log_flag);
    }

    args.extend(library_bindings.iter().cloned());

    args
}

/// Renders a test's selection name through the IP's
/// `hdl-src.test-name-template` (a `{{ name }}`-substitution template),
/// mirroring `do_simulate`'s `test_template.render(name=test)`. IPs with no
/// template use the bare test name.
fn render_test_name(ip: &crate::ip::Ip, test: &str) -> String {
    match &ip.hdl.test_name_template {
        Some(template) => template.replace("{{ name }}", test).replace("{{name}}", test),
        None => test.to_string(),
    }
}

/// Deterministic result-directory name for one test invocation: same
/// inputs always render the same name (spec.md §8 property 5).
pub(crate) fn test_result_dir_name(ip_name: &str, test_name: &str, seed: u32, raw_args: &[String]) -> String {
    let mut args = raw_args.to_vec();
    args.sort();
    if args.is_empty() {
        format!("{ip_name}__{test_name}__{seed}")
    } else {
        format!("{ip_name}__{test_name}__{seed}__{}", args.join("_"))
    }
}

/// Builds the full Simulate-stage argument vector for `job` against `ip`:
/// injects `UVM_TESTNAME`/`UVM_VERBOSITY`/`UVM_MAX_QUIT_COUNT` into the
/// plus-args the way `do_simulate` does, then appends per-simulator
/// waves/coverage/seed tokens. Creates `results_dir`'s `cov` subdirectory
/// when `job.cov` is set and, for Vivado waves, the wave-capture `.tcl`
/// script, mirroring `do_simulate`'s side effects.
pub(crate) fn build_simulate_args(
    ip: &crate::ip::Ip,
    job: &SimulationJob,
    log_path: &std::path::Path,
    results_dir: &std::path::Path,
    result_dir_name: &str,
) -> Result<Vec<String>> {
    let test_name = render_test_name(ip, job.test_name.as_deref().unwrap_or(&ip.name));

    let mut plus_args = job.sim_args.clone();
    plus_args.insert("UVM_TESTNAME".to_string(), test_name.clone());
    plus_args.insert("UVM_VERBOSITY".to_string(), format!("UVM_{}", job.verbosity.uvm_name()));
    plus_args.insert("UVM_MAX_QUIT_COUNT".to_string(), job.max_errors.to_string());

    let effective_job = SimulationJob { sim_args: plus_args, ..job.clone() };
    let mut args = assemble_stage_args(&effective_job, ToolStage::Simulate, log_path);

    if job.waves {
        if let Some(tokens) = job.simulator.waves_args(results_dir, result_dir_name) {
            if job.simulator == Simulator::Vivado {
                write_vivado_wave_script(results_dir)?;
            }
            args.extend(tokens);
        }
    }

    if job.cov {
        let cov_path = results_dir.join("cov");
        if let Some(tokens) = job.simulator.cov_args(&cov_path, &test_name, result_dir_name) {
            std::fs::create_dir_all(&cov_path)?;
            args.extend(tokens);
        }
    }

    if let Some(seed_token) = job.simulator.seed_token(job.seed) {
        args.push(seed_token);
    }

    Ok(args)
}

/// Writes the Vivado wave-capture TCL batch script `do_simulate` creates
/// once per results directory, if it is not already there.
fn write_vivado_wave_script(results_dir: &std::path::Path) -> Result<()> {
    let path = results_dir.join("waves.viv.tcl");
    if path.exists() {
        return Ok(());
    }
    std::fs::write(&path, "log_wave -recursive * \nrun -all \nquit \n")?;
    Ok(())
}

/// A compile/elaborate progress bar seeded from the history estimate, in
/// the same style as the teacher's `create_progress_bar` helper, standing
/// in for the original's `alive_bar`-driven `progress_bar()`.
fn create_progress_bar(estimated_seconds: u64, message: &str) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    let pb = ProgressBar::new(estimated_seconds);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn plus_args_string(sim_args: &HashMap<String, String>) -> String {
    let mut entries: Vec<String> = sim_args
        .iter()
        .map(|(k, v)| if v.is_empty() { format!("+{k}") } else { format!("+{k}={v}") })
        .collect();
    entries.sort();
    entries.join(" ")
}

pub fn print_stage_summary(identifier: &str, stage: &str, job: &SimulationJob) {
    use colored::Colorize;
    if job.dry_run {
        println!("{} dry-run: would have run {stage} for '{identifier}'", "->".cyan());
    } else {
        println!("{} {stage} of '{identifier}' complete (seed {})", "OK".green().bold(), job.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_raw_args_splits_defines_from_plusargs() {
        let raw = vec!["+define+FOO=1".to_string(), "+BAR".to_string(), "garbage".to_string()];
        let (cmp, sim) = parse_raw_args(&raw);
        assert_eq!(cmp.get("FOO"), Some(&"1".to_string()));
        assert_eq!(sim.get("BAR"), Some(&"".to_string()));
        assert_eq!(cmp.len(), 1);
        assert_eq!(sim.len(), 1);
    }

    #[test]
    fn seed_zero_is_rejected() {
        let job = SimulationJob {
            target_vendor: None,
            target_name: "uart".into(),
            simulator: Simulator::Questa,
            compile: false,
            elaborate: false,
            simulate: true,
            test_name: None,
            seed: 0,
            verbosity: Verbosity::None,
            max_errors: 10,
            waves: false,
            cov: false,
            gui: false,
            dry_run: true,
            is_regression: false,
            fsoc: false,
            raw_args: vec![],
            cmp_args: HashMap::new(),
            sim_args: HashMap::new(),
            regression_name: None,
            regression_timestamp: None,
        };
        assert!(job.validate().is_err());
    }

    fn test_job(simulator: Simulator) -> SimulationJob {
        SimulationJob {
            target_vendor: Some("acme".into()),
            target_name: "uart".into(),
            simulator,
            compile: true,
            elaborate: false,
            simulate: false,
            test_name: None,
            seed: 1,
            verbosity: Verbosity::Medium,
            max_errors: 10,
            waves: false,
            cov: false,
            gui: false,
            dry_run: false,
            is_regression: false,
            fsoc: false,
            raw_args: vec![],
            cmp_args: HashMap::new(),
            sim_args: HashMap::new(),
            regression_name: None,
            regression_timestamp: None,
        }
    }

    fn test_ip() -> crate::ip::Ip {
        use crate::ip::{Flags, HdlSource, IpOrigin, IpSubType, SimState};
        crate::ip::Ip {
            origin: IpOrigin::Project,
            vendor: Some("acme".into()),
            name: "uart".into(),
            source_path: "/proj/ip/uart".into(),
            scripts_path: None,
            dependencies: vec![],
            dut: None,
            hdl: HdlSource::default(),
            flags: Flags { sub_type: IpSubType::Normal, ..Default::default() },
            compiled: SimState::default(),
            elaborated: SimState::default(),
        }
    }

    #[test]
    fn render_test_name_substitutes_template() {
        let mut ip = test_ip();
        ip.hdl.test_name_template = Some("{{ name }}_seq".to_string());
        assert_eq!(render_test_name(&ip, "smoke"), "smoke_seq");
    }

    #[test]
    fn render_test_name_is_identity_without_template() {
        let ip = test_ip();
        assert_eq!(render_test_name(&ip, "smoke"), "smoke");
    }

    #[test]
    fn test_result_dir_name_sorts_raw_args_for_determinism() {
        let a = test_result_dir_name("uart", "smoke", 7, &["+B".to_string(), "+A".to_string()]);
        let b = test_result_dir_name("uart", "smoke", 7, &["+A".to_string(), "+B".to_string()]);
        assert_eq!(a, b);
        assert_eq!(a, "uart__smoke__7__+A_+B");
    }

    #[test]
    fn build_simulate_args_injects_seed_and_uvm_testname() {
        let dir = tempfile::tempdir().unwrap();
        let ip = test_ip();
        let mut job = test_job(Simulator::Questa);
        job.test_name = Some("smoke".to_string());
        job.seed = 42;
        let log_path = dir.path().join("sim.log");
        let args = build_simulate_args(&ip, &job, &log_path, dir.path(), "uart__smoke__42").unwrap();
        assert!(args.iter().any(|a| a == "+UVM_TESTNAME=smoke"));
        assert!(args.iter().any(|a| a == "-sv_seed 42"));
    }

    #[test]
    fn build_simulate_args_adds_waves_and_cov_for_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let ip = test_ip();
        let mut job = test_job(Simulator::Metrics);
        job.waves = true;
        job.cov = true;
        let log_path = dir.path().join("sim.log");
        let args = build_simulate_args(&ip, &job, &log_path, dir.path(), "uart__smoke__1").unwrap();
        assert!(args.iter().any(|a| a == "-waves uart__smoke__1.vcd"));
        assert!(args.iter().any(|a| a == "-code-cov a"));
        assert!(dir.path().join("cov").exists());
    }

    #[test]
    fn assemble_stage_args_prepends_vivado_filelist_flag_with_dashdash_f() {
        let job = test_job(Simulator::Vivado);
        let args = assemble_stage_args_with_filelist(
            &job,
            ToolStage::Compile,
            std::path::Path::new("/proj/.mio/sim/cmp/acme__uart.viv.cmp.log"),
            Some(std::path::Path::new("/proj/.mio/sim/out/viv/cmp_wd/acme__uart/uart.flist")),
            &[],
        );
        assert_eq!(args[0], "--incr");
        assert!(args.contains(&"-F".to_string()));
        let f_pos = args.iter().position(|a| a == "-F").unwrap();
        assert_eq!(args[f_pos + 1], "/proj/.mio/sim/out/viv/cmp_wd/acme__uart/uart.flist");
    }

    #[test]
    fn assemble_stage_args_uses_lowercase_f_for_non_vivado_simulators() {
        let job = test_job(Simulator::Questa);
        let args = assemble_stage_args_with_filelist(
            &job,
            ToolStage::Compile,
            std::path::Path::new("/proj/.mio/sim/cmp/acme__uart.qst.cmp.log"),
            Some(std::path::Path::new("/proj/.mio/sim/out/qst/cmp_wd/acme__uart/uart.flist")),
            &[],
        );
        assert!(args.contains(&"-f".to_string()));
        assert!(!args.contains(&"-F".to_string()));
    }

    #[test]
    fn assemble_stage_args_omits_filelist_token_when_none_given() {
        let job = test_job(Simulator::Vivado);
        let args = assemble_stage_args(&job, ToolStage::Simulate, std::path::Path::new("/proj/.mio/sim/out/uart.sim.log"));
        assert!(!args.contains(&"-F".to_string()));
    }

    #[test]
    fn assemble_stage_args_appends_library_bindings() {
        let job = test_job(Simulator::Questa);
        let args = assemble_stage_args_with_filelist(
            &job,
            ToolStage::Elaborate,
            std::path::Path::new("/proj/.mio/sim/elab/acme__uart.qst.elab.log"),
            None,
            &["-L acme__uvm".to_string(), "-L acme__uart".to_string()],
        );
        assert_eq!(&args[args.len() - 2..], &["-L acme__uvm".to_string(), "-L acme__uart".to_string()]);
    }

    #[test]
    fn simulate_stage_uses_plusarg_token_not_define_token() {
        let mut job = test_job(Simulator::Vcs);
        job.sim_args.insert("SEED_OVERRIDE".to_string(), "5".to_string());
        let args = assemble_stage_args(&job, ToolStage::Simulate, std::path::Path::new("/proj/.mio/sim/out/uart.sim.log"));
        assert!(args.iter().any(|a| a == "+SEED_OVERRIDE=5"));
        assert!(!args.iter().any(|a| a.starts_with("+define+")));
    }
}
