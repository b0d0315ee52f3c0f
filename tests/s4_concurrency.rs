//! Scenario S4: a regression with `max_jobs: 2` never runs more than two
//! simulate invocations at once, even when ten tests are expanded.

mod common;

use mio_sim::cache::IpCache;
use mio_sim::config::Config;
use mio_sim::filelist::FilelistSynthesizer;
use mio_sim::history::JobHistory;
use mio_sim::ip::IpOrigin;
use mio_sim::paths::Layout;
use mio_sim::regression::RegressionScheduler;
use mio_sim::simulator::Simulator;
use mio_sim::suite::TestSuite;
use serial_test::serial;

#[test]
#[serial(mio_stub)]
fn regression_never_exceeds_its_configured_concurrency_cap() {
    let project = common::stage_fixture("s4_concurrency");
    let bin_dir = common::stub_bin_dir("bin-concurrency");
    let prior_path = common::prepend_to_path(&bin_dir);
    common::clear_stub_env();

    let interval_dir = project.path().join("intervals");
    std::fs::create_dir_all(&interval_dir).unwrap();
    common::set_stub_env("MIO_STUB_INTERVAL_DIR", interval_dir.to_str().unwrap());

    let mut config = Config::load(project.path()).unwrap();
    config.default_simulator = Simulator::Vivado;
    let layout = Layout::new(project.path());

    let mut cache = IpCache::new();
    cache.scan(project.path(), IpOrigin::Project).unwrap();
    cache.resolve_all().unwrap();

    let mut history = JobHistory::default();
    let filelist = FilelistSynthesizer::new(&config.templates_dir).unwrap();

    let suite = TestSuite::parse_yml(&project.path().join("ts.yml")).unwrap();

    let scheduler = RegressionScheduler { config: &config, layout: &layout, filelist: &filelist };
    let summary = scheduler
        .run(&mut cache, &mut history, &suite, "load", false, Simulator::Vivado)
        .expect("regression should complete within its deadline");

    assert_eq!(summary.total, 10);
    assert_eq!(summary.passed, 10);
    assert!(!summary.timed_out);

    let mut intervals = Vec::new();
    for entry in std::fs::read_dir(&interval_dir).unwrap() {
        let path = entry.unwrap().path();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut parts = contents.split_whitespace();
        let start: i128 = parts.next().unwrap().parse().unwrap();
        let end: i128 = parts.next().unwrap().parse().unwrap();
        intervals.push((start, end));
    }
    assert_eq!(intervals.len(), 10, "every test should have recorded an interval");

    let max_overlap = max_concurrent_overlap(&intervals);
    assert!(max_overlap <= 2, "observed {max_overlap} overlapping invocations, expected at most 2");

    common::restore_path(&prior_path);
}

/// Sweep-line count of the maximum number of `[start, end)` intervals
/// active at any single instant.
fn max_concurrent_overlap(intervals: &[(i128, i128)]) -> usize {
    let mut events: Vec<(i128, i32)> = Vec::new();
    for &(start, end) in intervals {
        events.push((start, 1));
        events.push((end, -1));
    }
    events.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut current: i64 = 0;
    let mut max = 0i64;
    for (_, delta) in events {
        current += delta as i64;
        max = max.max(current);
    }
    max as usize
}
