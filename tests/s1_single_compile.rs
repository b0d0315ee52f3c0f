//! Scenario S1: compiling a dependency-free IP produces exactly one
//! compilation log at the fixed path and exactly one history record, and
//! a second compile of the same target is a no-op.

mod common;

use mio_sim::cache::IpCache;
use mio_sim::config::Config;
use mio_sim::filelist::FilelistSynthesizer;
use mio_sim::history::{JobHistory, Stage};
use mio_sim::ip::IpOrigin;
use mio_sim::job::{Orchestrator, SimulationJob, Verbosity};
use mio_sim::paths::Layout;
use mio_sim::simulator::Simulator;
use serial_test::serial;
use std::collections::HashMap;

fn single_compile_job() -> SimulationJob {
    SimulationJob {
        target_vendor: Some("acme".to_string()),
        target_name: "uart".to_string(),
        simulator: Simulator::Vivado,
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
        elab_args: HashMap::new(),
        sim_args: HashMap::new(),
        regression_name: None,
        regression_timestamp: None,
    }
}

#[test]
#[serial(mio_stub)]
fn compiling_a_leaf_ip_writes_one_log_and_one_history_record() {
    let project = common::stage_fixture("s1_single_compile");
    let bin_dir = common::stub_bin_dir("bin");
    let prior_path = common::prepend_to_path(&bin_dir);
    common::clear_stub_env();

    let mut config = Config::load(project.path()).unwrap();
    config.default_simulator = Simulator::Vivado;
    let layout = Layout::new(project.path());

    let mut cache = IpCache::new();
    cache.scan(project.path(), IpOrigin::Project).unwrap();
    cache.resolve_all().unwrap();

    let mut history = JobHistory::default();
    let filelist = FilelistSynthesizer::new(&config.templates_dir).unwrap();

    let mut orchestrator =
        Orchestrator { config: &config, layout: &layout, cache: &mut cache, history: &mut history, filelist: &filelist };

    let mut job = single_compile_job();
    orchestrator.run(&mut job).expect("first compile should succeed");

    let log_path = layout.cmp_log_path("acme", "uart", Simulator::Vivado);
    assert!(log_path.exists(), "expected compile log at {log_path:?}");
    assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "\n");

    let records = history.records("acme/uart", Stage::Compilation);
    assert_eq!(records.len(), 1, "exactly one compilation record expected");

    // Property 7: a second compile of an already-compiled target is a no-op.
    let mut second_job = single_compile_job();
    orchestrator.run(&mut second_job).expect("second compile should succeed");
    let records = history.records("acme/uart", Stage::Compilation);
    assert_eq!(records.len(), 1, "a second compile must not append a new record");

    common::restore_path(&prior_path);
}
