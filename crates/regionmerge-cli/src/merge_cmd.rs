//! `regionmerge merge`: merge region model files into one model.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use regionmerge::config::{CONFIG_FILE, RegionMergeConfig, StrategyKind};
use regionmerge::format::{load_model, to_toml_string, write_model};
use regionmerge::merge::merge;
use regionmerge::oracle::EnumerationOracle;

use crate::format::OutputFormat;

/// Indicator strategy as a command-line value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// One integer feature, one value per region.
    Integer,
    /// One boolean feature per region below a region root.
    FeatureTree,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Integer => Self::Integer,
            StrategyArg::FeatureTree => Self::FeatureTree,
        }
    }
}

/// Arguments for `regionmerge merge`.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Region model files. Indicator values follow this order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Configuration file (default: ./regionmerge.toml if present)
    #[arg(long, env = "REGIONMERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Name of the indicator feature (integer strategy)
    #[arg(long)]
    pub indicator: Option<String>,

    /// How regions are told apart in the merged model
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Name of the region root feature (feature-tree strategy)
    #[arg(long)]
    pub region_root: Option<String>,

    /// Write the merged model here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format: text or json
    #[arg(long, default_value = "text")]
    pub report: OutputFormat,

    /// Skip the redundancy-removal stage
    #[arg(long)]
    pub no_minimize: bool,

    /// Skip the solution-count verification
    #[arg(long)]
    pub no_verify: bool,

    /// Repeat minimization until nothing more is removed
    #[arg(long)]
    pub fixed_point: bool,

    /// Oracle wall-clock limit per call, in milliseconds (0 = unlimited)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Load the configuration named by `--config`, or `./regionmerge.toml`.
///
/// An explicit path must exist; the implicit one may be absent.
pub fn load_config(path: Option<&Path>) -> Result<RegionMergeConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                bail!(
                    "config file '{}' not found\n  To fix: check the path, or drop --config to use defaults",
                    path.display()
                );
            }
            Ok(RegionMergeConfig::load(path)?)
        }
        None => Ok(RegionMergeConfig::load(Path::new(CONFIG_FILE))?),
    }
}

impl MergeArgs {
    /// Fold command-line overrides into `config`.
    fn apply(&self, config: &mut RegionMergeConfig) {
        if let Some(indicator) = &self.indicator {
            config.merge.indicator.clone_from(indicator);
        }
        if let Some(strategy) = self.strategy {
            config.merge.strategy = strategy.into();
        }
        if let Some(root) = &self.region_root {
            config.merge.region_root.clone_from(root);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.oracle.timeout_ms = timeout_ms;
        }
        if self.no_minimize {
            config.minimize.enabled = false;
        }
        if self.fixed_point {
            config.minimize.fixed_point = true;
        }
        if self.no_verify {
            config.verify.enabled = false;
        }
    }
}

pub fn run(args: &MergeArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    let options = config.merge_options()?;

    let models = args
        .files
        .iter()
        .map(|path| load_model(path).with_context(|| format!("loading '{}'", path.display())))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(files = models.len(), strategy = %options.strategy, "merging");
    let outcome = merge(models, &EnumerationOracle::new(), &options).context("merge failed")?;

    let report = args.report.render(&outcome.report)?;
    if let Some(path) = &args.output {
        write_model(&outcome.model, path)?;
        println!("{report}");
    } else {
        print!("{}", to_toml_string(&outcome.model)?);
        eprintln!("{report}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: MergeArgs,
    }

    fn parse(argv: &[&str]) -> MergeArgs {
        Harness::try_parse_from(std::iter::once("merge").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn flags_override_config() {
        let args = parse(&[
            "a.toml",
            "b.toml",
            "--strategy",
            "feature-tree",
            "--region-root",
            "Market",
            "--timeout-ms",
            "0",
            "--no-minimize",
            "--no-verify",
        ]);
        let mut config = RegionMergeConfig::default();
        args.apply(&mut config);
        assert_eq!(config.merge.strategy, StrategyKind::FeatureTree);
        assert_eq!(config.merge.region_root, "Market");
        assert_eq!(config.oracle.timeout_ms, 0);
        assert!(!config.minimize.enabled);
        assert!(!config.verify.enabled);
    }

    #[test]
    fn no_flags_keep_config() {
        let args = parse(&["a.toml"]);
        let mut config = RegionMergeConfig::default();
        args.apply(&mut config);
        assert_eq!(config, RegionMergeConfig::default());
        assert_eq!(args.report, OutputFormat::Text);
    }

    #[test]
    fn requires_files() {
        assert!(Harness::try_parse_from(["merge"]).is_err());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/regionmerge.toml"))).unwrap_err();
        assert!(err.to_string().contains("To fix"));
    }
}
