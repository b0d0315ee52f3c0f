//! A formatted test result summary for one IP's recorded simulation runs,
//! read back from the Job History Store. The banner/line layout mirrors
//! the teacher's `cargo-test-summary` nextest formatter, applied here to
//! [`ResultsSummary`] instead of a subprocess's captured stdout.
//!
//! Usage: `mio-test-summary <ip> [regression]`

use std::process::ExitCode;

use colored::Colorize;
use mio_sim::results::{ResultsSummary, TestStatus};
use mio_sim::Project;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(ip) = args.next() else {
        eprintln!("usage: mio-test-summary <ip> [regression]");
        return ExitCode::FAILURE;
    };
    let regression = args.next();

    let project = match Project::load(std::env::current_dir().unwrap()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}: {e}", e.banner());
            return ExitCode::FAILURE;
        }
    };

    let summary = ResultsSummary::from_history(&project.history, &ip, regression.as_deref());
    print_summary(&summary);
    if summary.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_summary(summary: &ResultsSummary) {
    println!("========================== test session results ==========================");

    for test in &summary.tests {
        let time = test.duration.map(|d| format!("{:.3}", d.as_secs_f64())).unwrap_or_default();
        match test.status {
            TestStatus::Passed => {
                println!(
                    "        {} [{:>9}s] {} (seed {})",
                    "PASS".green().bold(),
                    time,
                    test.test_name,
                    test.seed
                );
            }
            TestStatus::Failed => {
                println!(
                    "        {} [{:>9}s] {} (seed {})",
                    "FAIL".red().bold(),
                    time,
                    test.test_name,
                    test.seed
                );
            }
        }
    }

    let passed = summary.passed();
    let failed = summary.failed();
    let mut parts = Vec::new();
    if passed > 0 {
        parts.push(format!("{passed} passed"));
    }
    if failed > 0 {
        parts.push(format!("{failed} failed"));
    }
    let text = if parts.is_empty() { "no tests run".to_string() } else { parts.join(", ") };

    println!("========================== {text} ==========================");
}
