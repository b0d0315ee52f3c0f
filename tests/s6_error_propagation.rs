//! Scenario S6: a compile log containing an error marker ("ERROR:")
//! makes the orchestrator report a tool failure, and nothing is marked
//! compiled.

mod common;

use mio_sim::cache::IpCache;
use mio_sim::config::Config;
use mio_sim::error::Error;
use mio_sim::filelist::FilelistSynthesizer;
use mio_sim::history::JobHistory;
use mio_sim::ip::IpOrigin;
use mio_sim::job::{Orchestrator, SimulationJob, Verbosity};
use mio_sim::paths::Layout;
use mio_sim::simulator::Simulator;
use serial_test::serial;
use std::collections::HashMap;

#[test]
#[serial(mio_stub)]
fn error_marker_in_compile_log_surfaces_as_tool_failure() {
    let project = common::stage_fixture("s1_single_compile");
    let bin_dir = common::stub_bin_dir("bin");
    let prior_path = common::prepend_to_path(&bin_dir);
    common::clear_stub_env();
    common::set_stub_env("MIO_STUB_LOG_LINE", "ERROR: syntax error near 'endmodule'");

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

    let mut job = SimulationJob {
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
    };

    let err = orchestrator.run(&mut job).expect_err("a logged ERROR: line must fail the compile");
    match err {
        Error::ToolFailure { .. } => {}
        other => panic!("expected a tool failure, got {other:?}"),
    }

    assert!(!cache.get_by_id(cache.get(Some("acme"), "uart", true).unwrap().unwrap()).compiled.get(Simulator::Vivado));

    common::restore_path(&prior_path);
}
