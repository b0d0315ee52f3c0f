//! Scenario S3: a dry-run regression produces no tool invocations and no
//! history records at all, but still reports the full expanded test
//! count.

mod common;

use mio_sim::cache::IpCache;
use mio_sim::config::Config;
use mio_sim::filelist::FilelistSynthesizer;
use mio_sim::history::{JobHistory, Stage};
use mio_sim::ip::IpOrigin;
use mio_sim::paths::Layout;
use mio_sim::regression::RegressionScheduler;
use mio_sim::simulator::Simulator;
use mio_sim::suite::TestSuite;
use serial_test::serial;

#[test]
#[serial(mio_stub)]
fn dry_run_regression_runs_no_tools_and_records_no_history() {
    let project = common::stage_fixture("s3_dry_run");
    // No stub on PATH at all: a dry run must never attempt to spawn one.
    let prior_path = std::env::var("PATH").unwrap_or_default();
    common::clear_stub_env();

    let mut config = Config::load(project.path()).unwrap();
    config.default_simulator = Simulator::Vivado;
    config.tool_homes.insert(Simulator::Vivado, project.path().to_path_buf());
    let layout = Layout::new(project.path());

    let mut cache = IpCache::new();
    cache.scan(project.path(), IpOrigin::Project).unwrap();
    cache.resolve_all().unwrap();

    let mut history = JobHistory::default();
    let filelist = FilelistSynthesizer::new(&config.templates_dir).unwrap();

    let suite = TestSuite::parse_yml(&project.path().join("ts.yml")).unwrap();

    let scheduler = RegressionScheduler { config: &config, layout: &layout, filelist: &filelist };
    let summary = scheduler
        .run(&mut cache, &mut history, &suite, "sanity", true, Simulator::Vivado)
        .expect("dry-run regression should succeed without touching a real tool");

    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 0);
    assert_eq!(summary.failed, 0);
    assert!(!summary.timed_out);

    assert!(history.records("tb", Stage::Compilation).is_empty());
    assert!(history.records("tb", Stage::Elaboration).is_empty());
    assert!(history.records("tb", Stage::Simulation).is_empty());

    common::restore_path(&prior_path);
}
