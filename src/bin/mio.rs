//! CLI entry point: parses arguments, loads the project, and dispatches
//! to the orchestrator, regression scheduler, or a collaborator hook.

use std::process::ExitCode;

use clap::Parser;
use mio_sim::cli::{Cli, CollaboratorHooks, Command, NullCollaborators};
use mio_sim::error::{Error, Result};
use mio_sim::job::{parse_raw_args, Orchestrator, SimulationJob, Verbosity};
use mio_sim::regression::RegressionScheduler;
use mio_sim::results::ResultsSummary;
use mio_sim::simulator::Simulator;
use mio_sim::suite::TestSuite;
use mio_sim::{process, Project};

fn main() -> ExitCode {
    mio_sim::logging::init();
    process::install_cancellation_hook();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", e.banner());
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let root = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let mut project = Project::load(&root)?;

    let result = dispatch(&cli.command, &mut project);

    // Persist history regardless of the command outcome: a failed stage
    // still leaves earlier, successful stages worth remembering.
    project.save()?;
    result
}

fn dispatch(command: &Command, project: &mut Project) -> Result<()> {
    let hooks = NullCollaborators;

    match command {
        Command::Sim {
            ip,
            test,
            seed,
            verbosity,
            max_errors,
            app,
            waves,
            cov,
            gui,
            compile_only,
            elaborate_only,
            simulate_only,
            dry_run,
            args,
        } => {
            let (target_vendor, target_name) = split_identifier(ip);
            let simulator = app.unwrap_or(project.config.default_simulator);
            let (cmp_args, sim_args) = parse_raw_args(args);

            let any_stage_flag = *compile_only || *elaborate_only || *simulate_only;
            let mut job = SimulationJob {
                target_vendor,
                target_name,
                simulator,
                compile: !any_stage_flag || *compile_only,
                elaborate: !any_stage_flag || *elaborate_only,
                simulate: !any_stage_flag || *simulate_only,
                test_name: test.clone(),
                seed: seed.unwrap_or_else(random_seed),
                verbosity: verbosity.as_deref().map(Verbosity::parse).unwrap_or(Verbosity::Medium),
                max_errors: max_errors.unwrap_or(10),
                waves: *waves,
                cov: *cov,
                gui: *gui,
                dry_run: *dry_run,
                is_regression: false,
                fsoc: false,
                raw_args: args.clone(),
                cmp_args,
                sim_args,
                regression_name: None,
                regression_timestamp: None,
            };

            let mut orchestrator = Orchestrator {
                config: &project.config,
                layout: &project.layout,
                cache: &mut project.cache,
                history: &mut project.history,
                filelist: &project.filelist,
            };
            orchestrator.run(&mut job)
        }

        Command::Regr { ip, regression, dry_run } => {
            let (target_vendor, target_name) = split_identifier(ip);
            let ip_id = project
                .cache
                .get(target_vendor.as_deref(), &target_name, true)?
                .expect("get(required=true) never returns Ok(None)");

            let (suite_qualifier, regression_name) = match regression.split_once('.') {
                Some((s, r)) => (Some(s.to_string()), r.to_string()),
                None => (None, regression.clone()),
            };

            let suite_path = resolve_suite_path(project.cache.get_by_id(ip_id), suite_qualifier.as_deref())?;
            let suite = TestSuite::parse_yml(&suite_path)?;

            let scheduler = RegressionScheduler {
                config: &project.config,
                layout: &project.layout,
                filelist: &project.filelist,
            };
            let summary = scheduler.run(
                &mut project.cache,
                &mut project.history,
                &suite,
                &regression_name,
                *dry_run,
                project.config.default_simulator,
            )?;

            println!(
                "{}: {}/{} passed ({} failed){}",
                summary.regression_id,
                summary.passed,
                summary.total,
                summary.failed,
                if summary.timed_out { ", timed out" } else { "" }
            );
            Ok(())
        }

        Command::Clean { ip, deep } => {
            let (vendor, name) = split_identifier(ip);
            let identifier = match &vendor {
                Some(v) => format!("{v}/{name}"),
                None => name.clone(),
            };
            for sim in Simulator::ALL {
                let v = vendor.clone().unwrap_or_default();
                let dir = project.layout.cmp_out_dir(sim, &v, &name);
                if dir.exists() {
                    std::fs::remove_dir_all(&dir)?;
                }
                if *deep {
                    let wd = project.layout.cmp_wd_dir(sim, &v, &name);
                    if wd.exists() {
                        std::fs::remove_dir_all(&wd)?;
                    }
                }
            }
            println!("cleaned {identifier}");
            Ok(())
        }

        Command::Cov { ip } => Err(Error::other(format!(
            "coverage merge for '{ip}' is not implemented by this crate"
        ))),

        Command::Results { ip, name } => {
            let identifier = ip.clone();
            let summary = ResultsSummary::from_history(&project.history, &identifier, Some(name.as_str()));
            println!("{identifier}/{name}: {} passed, {} failed", summary.passed(), summary.failed());
            Ok(())
        }

        Command::Install { ip, global, .. } => {
            let (vendor, name) = split_identifier(ip);
            let id = project
                .cache
                .get(vendor.as_deref(), &name, true)?
                .expect("get(required=true) never returns Ok(None)");
            let missing = project.cache.get_deps_to_install(id);
            if missing.is_empty() {
                println!("{ip}: all dependencies already installed");
            } else {
                println!(
                    "{ip}: {} dependenc{} not installed: {}",
                    missing.len(),
                    if missing.len() == 1 { "y" } else { "ies" },
                    missing.join(", ")
                );
            }
            let _ = global;
            Ok(())
        }

        Command::Login => hooks.login(),
        Command::Publish { ip } => hooks.publish(ip),
        Command::Package { ip } => hooks.package(ip),
        Command::New { name } => hooks.new_project(name),
        Command::Init => hooks.init_project(),
        Command::Dox { ip } => hooks.generate_docs(ip),

        Command::Doctor => {
            for sim in Simulator::ALL {
                let installed = project.config.has_explicit_tool_home(sim);
                println!("{:<8} {}", sim.full_name(), if installed { "configured" } else { "not configured" });
            }
            Ok(())
        }
    }
}

/// Locates a test-suite descriptor under `ip`'s `hdl-src.tests-path`
/// directory: the bare `ts.yml` when no qualifier is given, or
/// `<qualifier>.ts.yml` when `mio regr <ip> <qualifier>.<regression>` names
/// one, matching `regr.py::scan_target_ip_for_test_suite`'s directory walk.
fn resolve_suite_path(ip: &mio_sim::ip::Ip, suite_qualifier: Option<&str>) -> Result<std::path::PathBuf> {
    let tests_path = ip.hdl.tests_path.as_ref().ok_or_else(|| {
        Error::invalid_descriptor(&ip.source_path, "IP has no 'hdl-src.tests-path' for regression lookup")
    })?;
    let search_root = ip.source_path.join(tests_path);

    for entry in walkdir::WalkDir::new(&search_root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        match suite_qualifier {
            None if file_name == "ts.yml" => return Ok(entry.path().to_path_buf()),
            Some(qualifier) if file_name == format!("{qualifier}.ts.yml") => {
                return Ok(entry.path().to_path_buf());
            }
            _ => {}
        }
    }

    Err(Error::not_found(match suite_qualifier {
        Some(q) => format!("{q}.ts.yml under {}", search_root.display()),
        None => format!("ts.yml under {}", search_root.display()),
    }))
}

fn split_identifier(ip: &str) -> (Option<String>, String) {
    match ip.split_once('/') {
        Some((vendor, name)) => (Some(vendor.to_string()), name.to_string()),
        None => (None, ip.to_string()),
    }
}

fn random_seed() -> u32 {
    rand::random::<u32>() % 2_147_483_646 + 1
}
