//! Error types for mio-sim

use std::path::PathBuf;
use thiserror::Error;

/// Result type for mio-sim operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mio-sim
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error (ip.yml, ts.yml, .eda.yml)
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error (job history store)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema violation in an IP descriptor
    #[error("invalid IP descriptor '{path}': {reason}")]
    InvalidDescriptor { path: PathBuf, reason: String },

    /// Schema violation in a test-suite descriptor
    #[error("invalid test suite '{path}': {reason}")]
    InvalidSuite { path: PathBuf, reason: String },

    /// A named IP could not be found in the cache
    #[error("could not find IP '{0}'")]
    NotFound(String),

    /// A name-only lookup matched more than one IP
    #[error("IP name '{0}' is ambiguous; qualify it with a vendor")]
    Ambiguous(String),

    /// The dependency graph rooted at an IP contains a cycle
    #[error("cyclic dependency detected: {0}")]
    CyclicDependency(String),

    /// One or more transitive dependencies are not installed
    #[error("missing {0} dependencies: {1:?}")]
    MissingDependencies(usize, Vec<String>),

    /// A configured simulator's executables could not be found
    #[error("simulator '{0}' is not installed properly or its home is misconfigured")]
    SimulatorNotInstalled(String),

    /// Filelist or script template rendering failed
    #[error("template rendering failed: {0}")]
    TemplateFailure(String),

    /// A stage's log contained one or more error-regex matches
    #[error("tool failure during {stage} of '{ip}': {} error(s), see {log_path}", errors.len())]
    ToolFailure {
        ip: String,
        stage: String,
        log_path: PathBuf,
        errors: Vec<String>,
    },

    /// A regression exceeded its wall-clock budget
    #[error("regression '{0}' timed out after {1} hour(s)")]
    RegressionTimeout(String, f64),

    /// A file copy/move/create operation failed outside of a plain `io::Error`
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// Generic error with context, used at CLI/collaborator boundaries
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn invalid_descriptor(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor { path: path.into(), reason: reason.into() }
    }

    pub fn invalid_suite(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSuite { path: path.into(), reason: reason.into() }
    }

    pub fn not_found(ip: impl Into<String>) -> Self {
        Self::NotFound(ip.into())
    }

    pub fn ambiguous(name: impl Into<String>) -> Self {
        Self::Ambiguous(name.into())
    }

    pub fn cyclic_dependency(cycle: impl Into<String>) -> Self {
        Self::CyclicDependency(cycle.into())
    }

    pub fn missing_dependencies(deps: Vec<String>) -> Self {
        Self::MissingDependencies(deps.len(), deps)
    }

    pub fn simulator_not_installed(name: impl Into<String>) -> Self {
        Self::SimulatorNotInstalled(name.into())
    }

    pub fn template_failure(msg: impl Into<String>) -> Self {
        Self::TemplateFailure(msg.into())
    }

    pub fn tool_failure(
        ip: impl Into<String>,
        stage: impl Into<String>,
        log_path: impl Into<PathBuf>,
        errors: Vec<String>,
    ) -> Self {
        Self::ToolFailure { ip: ip.into(), stage: stage.into(), log_path: log_path.into(), errors }
    }

    pub fn regression_timeout(name: impl Into<String>, hours: f64) -> Self {
        Self::RegressionTimeout(name.into(), hours)
    }

    pub fn io_failure(msg: impl Into<String>) -> Self {
        Self::IoFailure(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Per spec.md §7: inside a regression, a per-test `ToolFailure` is
    /// captured but non-fatal to its siblings; every other kind aborts the
    /// whole regression.
    pub fn is_fatal_to_regression(&self) -> bool {
        !matches!(self, Self::ToolFailure { .. })
    }

    /// Short, single-line banner text printed above the error's `Display`
    /// body, matching the original's `common.fatal(...)` banner convention.
    pub fn banner(&self) -> &'static str {
        match self {
            Self::InvalidDescriptor { .. } | Self::InvalidSuite { .. } => "invalid descriptor",
            Self::NotFound(_) => "not found",
            Self::Ambiguous(_) => "ambiguous reference",
            Self::CyclicDependency(_) => "cyclic dependency",
            Self::MissingDependencies(..) => "missing dependencies",
            Self::SimulatorNotInstalled(_) => "simulator not installed",
            Self::TemplateFailure(_) => "template failure",
            Self::ToolFailure { .. } => "tool failure",
            Self::RegressionTimeout(..) => "regression timeout",
            Self::Io(_) | Self::IoFailure(_) => "I/O failure",
            Self::Yaml(_) | Self::Json(_) => "parse error",
            Self::Other(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_is_not_fatal_to_regression() {
        let e = Error::tool_failure("acme/uart", "compile", "cmp.log", vec!["ERROR: x".into()]);
        assert!(!e.is_fatal_to_regression());
    }

    #[test]
    fn other_kinds_are_fatal_to_regression() {
        assert!(Error::not_found("acme/uart").is_fatal_to_regression());
        assert!(Error::regression_timeout("sanity", 0.017).is_fatal_to_regression());
        assert!(Error::cyclic_dependency("a -> b -> a").is_fatal_to_regression());
    }

    #[test]
    fn missing_dependencies_carries_count() {
        let e = Error::missing_dependencies(vec!["a/b".into(), "c/d".into()]);
        match e {
            Error::MissingDependencies(n, deps) => {
                assert_eq!(n, 2);
                assert_eq!(deps.len(), 2);
            }
            _ => panic!("wrong variant"),
        }
    }
}
