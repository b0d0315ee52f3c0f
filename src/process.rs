//! The Process Launcher: runs one external tool invocation with a scoped
//! acquisition of "current working directory" and environment, and keeps
//! a registry of every live child so an abnormal exit can terminate them
//! all.
//!
//! Grounded in `eal.py::launch_eda_bin`'s `os.chdir(wd)` +
//! `subprocess.Popen` + global `eda_processes` list, and
//! `atexit.register(kill_all_processes)`. The redesign mandated by the
//! spec: `launch_eda_bin` itself has no locking around `chdir` at all, and
//! `regr.py::launch_sim_jobs` covers for that with a flat
//! `time.sleep(10)` before starting each worker. Here a single mutex
//! guards the `(setenv, chdir, spawn)` window instead, which is the actual
//! fix; the sleep is not carried over in any form.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, OnceLock};

use tracing::{debug, warn};

use crate::error::Result;

fn launch_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn children() -> &'static Mutex<HashMap<u32, Child>> {
    static CHILDREN: OnceLock<Mutex<HashMap<u32, Child>>> = OnceLock::new();
    CHILDREN.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Installs the SIGINT/SIGTERM handler that terminates every registered
/// child, the Rust equivalent of `atexit.register(kill_all_processes)`
/// (Rust has no process-wide atexit hook, so this pairs a signal handler
/// with an explicit call from the binary's fatal-error path).
pub fn install_cancellation_hook() {
    let result = ctrlc::set_handler(|| {
        warn!("received interrupt, terminating all tracked child processes");
        kill_all_children();
        std::process::exit(130);
    });
    if let Err(e) = result {
        warn!("failed to install cancellation hook: {e}");
    }
}

/// Terminates every process this launcher has ever spawned and not yet
/// reaped. Safe to call more than once.
pub fn kill_all_children() {
    let mut guard = children().lock().unwrap_or_else(|p| p.into_inner());
    for child in guard.values_mut() {
        let _ = child.kill();
    }
    guard.clear();
}

/// One recorded command line, as it was (or, in dry-run mode, would have
/// been) executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub wd: std::path::PathBuf,
}

impl RecordedCommand {
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for a in &self.args {
            line.push(' ');
            line.push_str(a);
        }
        line
    }
}

/// Launches `program` with `args` inside `wd`, with `env` applied under
/// the same mutex as the `chdir`, and blocks until the child exits.
///
/// Exit codes are not authoritative: the spec requires correctness to be
/// determined by scanning the stage's log file, since simulator vendors
/// do not agree on exit-code conventions. This function therefore ignores
/// the child's exit status entirely and reports only whether it could be
/// spawned at all.
pub fn launch(
    program: &str,
    args: &[String],
    wd: &Path,
    env: &HashMap<String, String>,
    echo_stdout: bool,
    dry_run: bool,
) -> Result<RecordedCommand> {
    let recorded = RecordedCommand { program: program.to_string(), args: args.to_vec(), wd: wd.to_path_buf() };

    if dry_run {
        debug!("dry-run: {}", recorded.command_line());
        return Ok(recorded);
    }

    let guard = launch_lock().lock().unwrap_or_else(|p| p.into_inner());

    std::fs::create_dir_all(wd)?;
    let mut command = Command::new(program);
    command.args(args).current_dir(wd).envs(env);

    if !echo_stdout {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let child = command.spawn().map_err(|e| {
        crate::error::Error::io_failure(format!("failed to launch '{program}': {e}"))
    })?;
    let pid = child.id();

    children().lock().unwrap_or_else(|p| p.into_inner()).insert(pid, child);
    drop(guard);

    // Poll for exit rather than removing the child from the registry and
    // blocking on it directly: the child must stay registered under `pid`
    // for the whole run so a cancellation hook firing mid-run (regression
    // timeout, SIGINT) can still find and kill it.
    loop {
        let mut guard = children().lock().unwrap_or_else(|p| p.into_inner());
        match guard.get_mut(&pid) {
            Some(child) => match child.try_wait() {
                Ok(Some(_status)) => {
                    guard.remove(&pid);
                    break;
                }
                Ok(None) => {
                    drop(guard);
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
                Err(_) => {
                    guard.remove(&pid);
                    break;
                }
            },
            // Already reaped and removed by `kill_all_children`.
            None => break,
        }
    }

    Ok(recorded)
}
