//! Shared scaffolding for the end-to-end pipeline tests: fixture staging
//! and `PATH` manipulation so a checked-in stub script stands in for a
//! real simulator binary.

use std::path::{Path, PathBuf};

/// Copies `tests/fixtures/<name>` into a fresh temp directory and returns
/// it, so a test's `.mio/...` working-directory writes never touch the
/// checked-in fixture tree.
pub fn stage_fixture(name: &str) -> tempfile::TempDir {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    let dir = tempfile::tempdir().expect("create staging tempdir");
    copy_dir_recursive(&src, dir.path());
    dir
}

fn copy_dir_recursive(src: &Path, dst: &Path) {
    for entry in std::fs::read_dir(src).unwrap_or_else(|e| panic!("read_dir({src:?}): {e}")) {
        let entry = entry.unwrap();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type().unwrap();
        if file_type.is_dir() {
            std::fs::create_dir_all(&dst_path).unwrap();
            copy_dir_recursive(&entry.path(), &dst_path);
        } else {
            std::fs::copy(entry.path(), &dst_path).unwrap();
        }
    }
}

/// Absolute path to one of the checked-in stub-binary directories.
pub fn stub_bin_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Prepends `bin_dir` to the process `PATH` and returns the prior value,
/// so the caller can restore it. Callers must run under `#[serial(...)]`
/// since `PATH` is process-global.
pub fn prepend_to_path(bin_dir: &Path) -> String {
    let prior = std::env::var("PATH").unwrap_or_default();
    let mut paths = vec![bin_dir.to_path_buf()];
    paths.extend(std::env::split_paths(&prior));
    let joined = std::env::join_paths(paths).expect("join PATH entries");
    unsafe {
        std::env::set_var("PATH", &joined);
    }
    prior
}

pub fn restore_path(prior: &str) {
    unsafe {
        std::env::set_var("PATH", prior);
    }
}

/// Clears the stub-script env vars that previous tests may have left set,
/// so each test starts from a known-empty stub configuration.
pub fn clear_stub_env() {
    unsafe {
        std::env::remove_var("MIO_STUB_SEQUENCE_FILE");
        std::env::remove_var("MIO_STUB_LOG_LINE");
        std::env::remove_var("MIO_STUB_INTERVAL_DIR");
    }
}

pub fn set_stub_env(key: &str, value: &str) {
    unsafe {
        std::env::set_var(key, value);
    }
}
