//! `regionmerge count` and `regionmerge check`: look at a single model file.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use regionmerge::error::MergeError;
use regionmerge::format::load_model;
use regionmerge::merge::check_satisfiable;
use regionmerge::oracle::{CountVerdict, EnumerationOracle, FeatureName, Oracle};
use serde::Serialize;

use crate::format::OutputFormat;
use crate::merge_cmd::load_config;

// ---------------------------------------------------------------------------
// count
// ---------------------------------------------------------------------------

/// Arguments for `regionmerge count`.
#[derive(Args, Debug)]
pub struct CountArgs {
    /// Model file
    pub file: PathBuf,

    /// Fix a feature to a value before counting (repeatable)
    #[arg(long = "where", value_name = "FEATURE=VALUE", value_parser = parse_assumption)]
    pub assumptions: Vec<(FeatureName, i64)>,

    /// Configuration file (default: ./regionmerge.toml if present)
    #[arg(long, env = "REGIONMERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format: text or json
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct CountOutput {
    region: String,
    count: u128,
}

impl fmt::Display for CountOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count)
    }
}

/// Parse `feature=value` for `--where`.
fn parse_assumption(s: &str) -> Result<(FeatureName, i64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FEATURE=VALUE, got '{s}'"))?;
    let name = FeatureName::new(name.trim()).map_err(|e| e.to_string())?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not an integer", value.trim()))?;
    Ok((name, value))
}

pub fn count(args: &CountArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let model = load_model(&args.file).with_context(|| format!("loading '{}'", args.file.display()))?;
    for (name, _) in &args.assumptions {
        if !model.features.contains_key(name) {
            bail!(
                "--where names unknown feature '{name}'\n  To fix: use one of the features declared in '{}'",
                args.file.display()
            );
        }
    }

    let query = model
        .query()
        .with_assumptions(&args.assumptions)
        .with_budget(config.oracle.budget());
    match EnumerationOracle::new().count(&query)? {
        CountVerdict::Exact(count) => {
            let output = CountOutput {
                region: model.region.to_string(),
                count,
            };
            println!("{}", args.format.render(&output)?);
            Ok(())
        }
        CountVerdict::Timeout => bail!(
            "count timed out\n  To fix: raise [oracle] timeout_ms / max_steps, or pass --timeout-ms 0"
        ),
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

/// Arguments for `regionmerge check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Model file
    pub file: PathBuf,

    /// Configuration file (default: ./regionmerge.toml if present)
    #[arg(long, env = "REGIONMERGE_CONFIG")]
    pub config: Option<PathBuf>,
}

pub fn check(args: &CheckArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let model = load_model(&args.file).with_context(|| format!("loading '{}'", args.file.display()))?;
    match check_satisfiable(&model, &EnumerationOracle::new(), config.oracle.budget()) {
        Ok(()) => {
            println!(
                "[OK] {}: {} features, {} constraints, satisfiable",
                model.region,
                model.features.len(),
                model.len()
            );
            Ok(())
        }
        Err(e @ MergeError::BaseModelUndecided { .. }) => {
            Err(e).context("satisfiability could not be decided within the oracle budget")
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assumptions() {
        let (name, value) = parse_assumption("region = 1").unwrap();
        assert_eq!(name.as_str(), "region");
        assert_eq!(value, 1);
        assert!(parse_assumption("region").unwrap_err().contains("FEATURE=VALUE"));
        assert!(parse_assumption("region=one").unwrap_err().contains("not an integer"));
        assert!(parse_assumption("=1").is_err());
    }
}
