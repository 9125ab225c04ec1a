//! Merge configuration (`regionmerge.toml`).
//!
//! Defines the typed configuration for oracle budgets, the indicator
//! strategy and the optional pipeline stages. Every field has a default, and
//! a missing file means "all defaults". Command-line flags override file
//! values.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regionmerge_oracle::Budget;
use serde::Deserialize;

use crate::format::toml_message;
use crate::merge::types::{IndicatorStrategy, MergeOptions};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "regionmerge.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionMergeConfig {
    /// Oracle budget.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Indicator and input checks.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Resolver settings.
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Minimizer settings.
    #[serde(default)]
    pub minimize: MinimizeConfig,

    /// Verification settings.
    #[serde(default)]
    pub verify: VerifyConfig,
}

// ---------------------------------------------------------------------------
// OracleConfig
// ---------------------------------------------------------------------------

/// Per-call oracle budget.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OracleConfig {
    /// Wall-clock limit per call in milliseconds (default: 10000; 0 = unlimited).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Search-step limit per call (default: 0 = unlimited).
    #[serde(default)]
    pub max_steps: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_steps: 0,
        }
    }
}

const fn default_timeout_ms() -> u64 {
    10_000
}

impl OracleConfig {
    /// The [`Budget`] these settings describe.
    #[must_use]
    pub const fn budget(&self) -> Budget {
        let mut budget = Budget::unlimited();
        if self.timeout_ms > 0 {
            budget = budget.with_timeout(Duration::from_millis(self.timeout_ms));
        }
        if self.max_steps > 0 {
            budget = budget.with_max_steps(self.max_steps);
        }
        budget
    }
}

// ---------------------------------------------------------------------------
// MergeConfig
// ---------------------------------------------------------------------------

/// Indicator strategy and input checks.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Indicator feature name for the integer strategy (default: `"region"`).
    #[serde(default = "default_indicator")]
    pub indicator: String,

    /// Which indicator strategy to use.
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Region root feature for the feature-tree strategy (default: `"Region"`).
    #[serde(default = "default_region_root")]
    pub region_root: String,

    /// Reject unsatisfiable inputs before merging (default: true).
    #[serde(default = "default_true")]
    pub check_base: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            indicator: default_indicator(),
            strategy: StrategyKind::default(),
            region_root: default_region_root(),
            check_base: true,
        }
    }
}

fn default_indicator() -> String {
    "region".to_owned()
}

fn default_region_root() -> String {
    "Region".to_owned()
}

const fn default_true() -> bool {
    true
}

/// The indicator strategy, as named in configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// One integer indicator feature.
    #[default]
    Integer,
    /// Boolean region features below the model root.
    FeatureTree,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::FeatureTree => write!(f, "feature-tree"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage configs
// ---------------------------------------------------------------------------

/// Resolver settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveConfig {
    /// Run the resolver (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Minimizer settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinimizeConfig {
    /// Run the minimizer (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Repeat passes until nothing is removed (default: false).
    #[serde(default)]
    pub fixed_point: bool,

    /// Pass limit for `fixed_point` (default: 8).
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fixed_point: false,
            max_passes: default_max_passes(),
        }
    }
}

const fn default_max_passes() -> usize {
    8
}

/// Verification settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyConfig {
    /// Compare solution counts after merging (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl RegionMergeConfig {
    /// Load configuration from a TOML file.
    ///
    /// - File not found → returns `Ok(RegionMergeConfig::default())`.
    /// - File exists but is invalid → returns a [`ConfigError`] with
    ///   line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError {
            path: None,
            message: toml_message(toml_str, &e),
        })
    }

    /// Pipeline options described by this configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` if `merge.indicator` or `merge.region_root` is
    /// not a valid feature name.
    pub fn merge_options(&self) -> Result<MergeOptions, ConfigError> {
        let strategy = match self.merge.strategy {
            StrategyKind::Integer => IndicatorStrategy::integer(&self.merge.indicator),
            StrategyKind::FeatureTree => IndicatorStrategy::feature_tree(&self.merge.region_root),
        }
        .map_err(|e| ConfigError {
            path: None,
            message: format!("[merge]: {e}"),
        })?;
        let mut options = MergeOptions::new(strategy);
        options.budget = self.oracle.budget();
        options.check_base = self.merge.check_base;
        options.resolve = self.resolve.enabled;
        options.minimize = self.minimize.enabled;
        options.fixed_point = self.minimize.fixed_point;
        options.max_passes = self.minimize.max_passes;
        options.verify = self.verify.enabled;
        Ok(options)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = RegionMergeConfig::default();
        assert_eq!(cfg.oracle.timeout_ms, 10_000);
        assert_eq!(cfg.oracle.max_steps, 0);
        assert_eq!(cfg.merge.indicator, "region");
        assert_eq!(cfg.merge.strategy, StrategyKind::Integer);
        assert_eq!(cfg.merge.region_root, "Region");
        assert!(cfg.merge.check_base);
        assert!(cfg.resolve.enabled);
        assert!(cfg.minimize.enabled);
        assert!(!cfg.minimize.fixed_point);
        assert_eq!(cfg.minimize.max_passes, 8);
        assert!(cfg.verify.enabled);
    }

    #[test]
    fn parse_empty_string() {
        let cfg = RegionMergeConfig::parse("").unwrap();
        assert_eq!(cfg, RegionMergeConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[oracle]
timeout_ms = 0
max_steps = 5000

[merge]
indicator = "market"
strategy = "feature-tree"
region_root = "Market"
check_base = false

[resolve]
enabled = false

[minimize]
fixed_point = true
max_passes = 3

[verify]
enabled = false
"#;
        let cfg = RegionMergeConfig::parse(toml).unwrap();
        assert_eq!(cfg.oracle.max_steps, 5000);
        assert_eq!(cfg.merge.strategy, StrategyKind::FeatureTree);
        assert_eq!(cfg.merge.region_root, "Market");
        assert!(!cfg.merge.check_base);
        assert!(!cfg.resolve.enabled);
        assert!(cfg.minimize.enabled);
        assert!(cfg.minimize.fixed_point);
        assert_eq!(cfg.minimize.max_passes, 3);
        assert!(!cfg.verify.enabled);
    }

    #[test]
    fn budget_treats_zero_as_unlimited() {
        let cfg = RegionMergeConfig::parse("[oracle]\ntimeout_ms = 0\n").unwrap();
        assert!(cfg.oracle.budget().is_unlimited());

        let budget = RegionMergeConfig::default().oracle.budget();
        assert_eq!(budget.timeout, Some(Duration::from_secs(10)));
        assert_eq!(budget.max_steps, None);
    }

    #[test]
    fn merge_options_follow_config() {
        let cfg = RegionMergeConfig::parse(
            "[merge]\nstrategy = \"feature-tree\"\n[minimize]\nenabled = false\n",
        )
        .unwrap();
        let options = cfg.merge_options().unwrap();
        assert_eq!(
            options.strategy,
            IndicatorStrategy::feature_tree("Region").unwrap()
        );
        assert!(!options.minimize);
        assert!(options.verify);
    }

    #[test]
    fn merge_options_reject_bad_indicator() {
        let cfg = RegionMergeConfig::parse("[merge]\nindicator = \"9lives\"\n").unwrap();
        let err = cfg.merge_options().unwrap_err();
        assert!(err.message.contains("[merge]"), "{err}");
    }

    #[test]
    fn parse_rejects_unknown_nested_field() {
        let err = RegionMergeConfig::parse("[minimize]\naggressive = true\n").unwrap_err();
        assert!(err.message.contains("line"), "{}", err.message);
    }

    #[test]
    fn parse_rejects_invalid_strategy() {
        assert!(RegionMergeConfig::parse("[merge]\nstrategy = \"bitmask\"\n").is_err());
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = RegionMergeConfig::load(Path::new("/nonexistent/regionmerge.toml")).unwrap();
        assert_eq!(cfg, RegionMergeConfig::default());
    }

    #[test]
    fn load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[oracle]\nmax_steps = 42\n").unwrap();
        let cfg = RegionMergeConfig::load(&path).unwrap();
        assert_eq!(cfg.oracle.max_steps, 42);
    }

    #[test]
    fn load_invalid_file_shows_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid [[[toml").unwrap();
        let err = RegionMergeConfig::load(&path).unwrap_err();
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
        assert!(!err.message.is_empty());
    }

    #[test]
    fn config_error_display() {
        let with_path = ConfigError {
            path: Some(PathBuf::from("/work/regionmerge.toml")),
            message: "bad field".to_owned(),
        };
        assert_eq!(with_path.to_string(), "/work/regionmerge.toml: bad field");
        let without = ConfigError {
            path: None,
            message: "parse error".to_owned(),
        };
        assert_eq!(without.to_string(), "config error: parse error");
    }

    #[test]
    fn strategy_display() {
        assert_eq!(StrategyKind::Integer.to_string(), "integer");
        assert_eq!(StrategyKind::FeatureTree.to_string(), "feature-tree");
    }
}
