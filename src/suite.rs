//! Test Suite Model & Parser: deterministically transforms a
//! `[<name>.]ts.yml` descriptor into a `Regression` of expanded,
//! deduplicated `RegressionTest` values.
//!
//! Grounded in `regr.py`'s `TestSuite.parse_yml` manual tree-walk (not a
//! single `#[derive(Deserialize)]`, since a regression-spec leaf is
//! polymorphic: a bare integer, a list of integers, or a mapping) and
//! `Regression.reduce()`/`RegressionTest.is_equal()` for deduplication.

use std::collections::HashSet;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{Error, Result};

const MIN_TESTS: usize = 1;
const MAX_TESTS: usize = 1000;
const WARN_ABOVE_TESTS: usize = 100;
const MAX_SEED: u32 = 2_147_483_646;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteRegressionSettings {
    #[serde(default)]
    pub waves: bool,
    #[serde(default)]
    pub cov: bool,
    #[serde(default)]
    pub verbosity: Option<String>,
    pub max_duration: f64,
    pub max_jobs: usize,
}

/// Raw on-disk shape of one `ts.yml` file, deserialized directly;
/// `sets` maps set name -> group name -> test name -> regression name ->
/// regression-spec (the polymorphic leaf).
#[derive(Debug, Clone, Deserialize)]
struct RawTestSuite {
    name: Option<String>,
    target: String,
    #[serde(default)]
    target_args: Vec<String>,
    #[serde(default)]
    regressions: std::collections::HashMap<String, SuiteRegressionSettings>,
    #[serde(default)]
    sets: std::collections::HashMap<String, std::collections::HashMap<String, std::collections::HashMap<String, std::collections::HashMap<String, Value>>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegressionTest {
    pub name: String,
    pub regression: String,
    pub group: String,
    pub set: String,
    pub suite: String,
    pub seed: u32,
    pub args: Vec<String>,
}

impl RegressionTest {
    fn dedup_key(&self) -> (String, String, String, String, String, u32, Vec<String>) {
        let mut args = self.args.clone();
        args.sort();
        (
            self.name.clone(),
            self.regression.clone(),
            self.group.clone(),
            self.set.clone(),
            self.suite.clone(),
            self.seed,
            args,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Regression {
    pub name: String,
    pub tests: Vec<RegressionTest>,
}

impl Regression {
    /// Removes duplicate tests (same name/regression/group/set/suite/seed
    /// and sorted args), matching `RegressionTest.is_equal()` semantics but
    /// implemented with a hash key instead of `regr.py`'s compare-all-pairs
    /// loop. Returns the number of duplicates removed.
    pub fn reduce(&mut self) -> usize {
        let mut seen = HashSet::new();
        let before = self.tests.len();
        self.tests.retain(|t| seen.insert(t.dedup_key()));
        before - self.tests.len()
    }
}

pub struct TestSuite {
    pub name: Option<String>,
    pub target: String,
    pub target_args: Vec<String>,
    settings: std::collections::HashMap<String, SuiteRegressionSettings>,
    raw_sets: std::collections::HashMap<String, std::collections::HashMap<String, std::collections::HashMap<String, std::collections::HashMap<String, Value>>>>,
    source_path: std::path::PathBuf,
}

impl TestSuite {
    /// Parses a `[<name>.]ts.yml` file.
    pub fn parse_yml(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let raw: RawTestSuite = serde_yaml::from_str(&contents)
            .map_err(|e| Error::invalid_suite(path, format!("failed to parse ts.yml: {e}")))?;

        Ok(Self {
            name: raw.name,
            target: raw.target,
            target_args: raw.target_args,
            settings: raw.regressions,
            raw_sets: raw.sets,
            source_path: path.to_path_buf(),
        })
    }

    pub fn regression_settings(&self, regression: &str) -> Result<&SuiteRegressionSettings> {
        self.settings.get(regression).ok_or_else(|| {
            Error::invalid_suite(&self.source_path, format!("no such regression '{regression}'"))
        })
    }

    /// Expands every `set.group.test.<regression>` entry for `regression`
    /// into `RegressionTest` values, deduplicates them, and validates the
    /// 1..1000 test-count bound. Returns the (possibly reduced) regression
    /// plus a count of duplicates removed, for the caller to warn about.
    pub fn expand(&self, regression_name: &str) -> Result<(Regression, usize)> {
        let settings = self.regression_settings(regression_name)?;
        if settings.max_duration <= 0.0 {
            return Err(Error::invalid_suite(&self.source_path, "max_duration must be positive"));
        }
        if settings.max_jobs == 0 {
            return Err(Error::invalid_suite(&self.source_path, "max_jobs must be positive"));
        }

        let suite_name = self.name.clone().unwrap_or_default();
        let mut tests = Vec::new();

        for (set_name, groups) in &self.raw_sets {
            for (group_name, test_names) in groups {
                for (test_name, regression_specs) in test_names {
                    let Some(spec) = regression_specs.get(regression_name) else { continue };
                    let expanded = self.expand_spec(
                        spec,
                        &suite_name,
                        set_name,
                        group_name,
                        test_name,
                        regression_name,
                    )?;
                    tests.extend(expanded);
                }
            }
        }

        let mut regression = Regression { name: regression_name.to_string(), tests };
        let duplicates = regression.reduce();

        let count = regression.tests.len();
        if !(MIN_TESTS..=MAX_TESTS).contains(&count) {
            return Err(Error::invalid_suite(
                &self.source_path,
                format!("regression '{regression_name}' expands to {count} tests, must be in 1..=1000"),
            ));
        }
        if count > WARN_ABOVE_TESTS {
            tracing::warn!("regression '{regression_name}' expands to {count} tests (> {WARN_ABOVE_TESTS})");
        }

        Ok((regression, duplicates))
    }

    fn expand_spec(
        &self,
        spec: &Value,
        suite: &str,
        set: &str,
        group: &str,
        test: &str,
        regression: &str,
    ) -> Result<Vec<RegressionTest>> {
        let path = format!("{set}.{group}.{test}.{regression}");

        let (seeds, args) = match spec {
            Value::Number(n) => {
                let count = n.as_u64().ok_or_else(|| Error::invalid_suite(&self.source_path, format!("{path}: not a positive integer")))? as usize;
                (self.random_seeds(count)?, Vec::new())
            }
            Value::Sequence(seq) => {
                let seeds = seq
                    .iter()
                    .map(|v| {
                        v.as_u64()
                            .and_then(|n| u32::try_from(n).ok())
                            .filter(|&s| s >= 1 && s <= MAX_SEED)
                            .ok_or_else(|| Error::invalid_suite(&self.source_path, format!("{path}: invalid seed")))
                    })
                    .collect::<Result<Vec<_>>>()?;
                (seeds, Vec::new())
            }
            Value::Mapping(map) => {
                let seeds_value = map
                    .get(Value::String("seeds".to_string()))
                    .ok_or_else(|| Error::invalid_suite(&self.source_path, format!("{path}: mapping form requires 'seeds'")))?;
                let seeds = match seeds_value {
                    Value::Number(n) => self.random_seeds(n.as_u64().unwrap_or(0) as usize)?,
                    Value::Sequence(seq) => seq
                        .iter()
                        .map(|v| {
                            v.as_u64()
                                .and_then(|n| u32::try_from(n).ok())
                                .filter(|&s| s >= 1 && s <= MAX_SEED)
                                .ok_or_else(|| Error::invalid_suite(&self.source_path, format!("{path}: invalid seed")))
                        })
                        .collect::<Result<Vec<_>>>()?,
                    _ => return Err(Error::invalid_suite(&self.source_path, format!("{path}: 'seeds' must be an integer or list"))),
                };
                let args = map
                    .get(Value::String("args".to_string()))
                    .and_then(|v| v.as_sequence())
                    .map(|seq| seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                (seeds, args)
            }
            _ => return Err(Error::invalid_suite(&self.source_path, format!("{path}: unsupported regression-spec form"))),
        };

        Ok(seeds
            .into_iter()
            .map(|seed| RegressionTest {
                name: test.to_string(),
                regression: regression.to_string(),
                group: group.to_string(),
                set: set.to_string(),
                suite: suite.to_string(),
                seed,
                args: args.clone(),
            })
            .collect())
    }

    /// Generates `count` uniformly-random seeds in `[1, 2^31 - 2]`. A
    /// requested count of zero is rejected, matching "a seed of zero is
    /// rejected" (the expansion source of a zero seed is always a
    /// zero-count request since random seeds never land on zero here).
    fn random_seeds(&self, count: usize) -> Result<Vec<u32>> {
        if count == 0 {
            return Err(Error::invalid_suite(&self.source_path, "seed count must be positive"));
        }
        let mut rng = rand::thread_rng();
        Ok((0..count).map(|_| rng.gen_range(1..=MAX_SEED)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_case(seed: u32, args: Vec<&str>) -> RegressionTest {
        RegressionTest {
            name: "basic".into(),
            regression: "sanity".into(),
            group: "core".into(),
            set: "uart".into(),
            suite: "uart".into(),
            seed,
            args: args.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn reduce_removes_exact_duplicates() {
        let mut regression = Regression {
            name: "sanity".into(),
            tests: vec![test_case(1, vec!["+FOO"]), test_case(1, vec!["+FOO"]), test_case(2, vec![])],
        };
        let removed = regression.reduce();
        assert_eq!(removed, 1);
        assert_eq!(regression.tests.len(), 2);
    }

    #[test]
    fn reduce_treats_different_arg_order_as_identical() {
        let mut regression = Regression {
            name: "sanity".into(),
            tests: vec![test_case(1, vec!["+A", "+B"]), test_case(1, vec!["+B", "+A"])],
        };
        assert_eq!(regression.reduce(), 1);
    }

    #[test]
    fn zero_count_is_rejected() {
        let suite = TestSuite {
            name: None,
            target: "uart".into(),
            target_args: vec![],
            settings: Default::default(),
            raw_sets: Default::default(),
            source_path: "ts.yml".into(),
        };
        assert!(suite.random_seeds(0).is_err());
    }

    #[test]
    fn random_seeds_stay_in_range() {
        let suite = TestSuite {
            name: None,
            target: "uart".into(),
            target_args: vec![],
            settings: Default::default(),
            raw_sets: Default::default(),
            source_path: "ts.yml".into(),
        };
        let seeds = suite.random_seeds(50).unwrap();
        assert_eq!(seeds.len(), 50);
        assert!(seeds.iter().all(|&s| s >= 1 && s <= MAX_SEED));
    }

    #[test]
    fn explicit_seed_zero_is_rejected() {
        let suite = TestSuite {
            name: None,
            target: "uart".into(),
            target_args: vec![],
            settings: Default::default(),
            raw_sets: Default::default(),
            source_path: "ts.yml".into(),
        };
        let spec: Value = serde_yaml::from_str("[0, 1, 2]").unwrap();
        assert!(suite.expand_spec(&spec, "s", "set", "grp", "t", "sanity").is_err());
    }

    #[test]
    fn max_duration_zero_is_rejected() {
        let mut settings = std::collections::HashMap::new();
        settings.insert(
            "sanity".to_string(),
            SuiteRegressionSettings { waves: false, cov: false, verbosity: None, max_duration: 0.0, max_jobs: 1 },
        );
        let suite = TestSuite {
            name: None,
            target: "uart".into(),
            target_args: vec![],
            settings,
            raw_sets: Default::default(),
            source_path: "ts.yml".into(),
        };
        let err = suite.expand("sanity").unwrap_err();
        assert!(err.to_string().contains("max_duration"));
    }

    fn suite_with_test_count(count: usize) -> TestSuite {
        let mut settings = std::collections::HashMap::new();
        settings.insert(
            "sanity".to_string(),
            SuiteRegressionSettings { waves: false, cov: false, verbosity: None, max_duration: 1.0, max_jobs: 1 },
        );
        let mut tests = std::collections::HashMap::new();
        for i in 0..count {
            let mut regressions = std::collections::HashMap::new();
            let _ = i;
            let seed_spec: Value = serde_yaml::from_str("1").unwrap();
            regressions.insert("sanity".to_string(), seed_spec);
            tests.insert(format!("test_{i}"), regressions);
        }
        let mut groups = std::collections::HashMap::new();
        groups.insert("grp".to_string(), tests);
        let mut raw_sets = std::collections::HashMap::new();
        raw_sets.insert("core".to_string(), groups);

        TestSuite {
            name: None,
            target: "uart".into(),
            target_args: vec![],
            settings,
            raw_sets,
            source_path: "ts.yml".into(),
        }
    }

    #[test]
    fn exactly_1000_tests_is_accepted() {
        let suite = suite_with_test_count(1000);
        let (regression, _) = suite.expand("sanity").unwrap();
        assert_eq!(regression.tests.len(), 1000);
    }

    #[test]
    fn over_1000_tests_is_rejected() {
        let suite = suite_with_test_count(1001);
        assert!(suite.expand("sanity").is_err());
    }

    #[test]
    fn single_test_is_accepted() {
        let suite = suite_with_test_count(1);
        let (regression, _) = suite.expand("sanity").unwrap();
        assert_eq!(regression.tests.len(), 1);
    }
}
