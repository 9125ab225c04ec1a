//! The [`MergeReport`]: what a pipeline run did, for humans and machines.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::merge::minimize::MinimizeStats;
use crate::merge::resolve::ResolveStats;
use crate::merge::verify::Verification;
use crate::model::{KindCounts, RegionId};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// A pipeline stage, as named in reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Input validation and the base-satisfiability check.
    Validate,
    /// Guarding each region's constraints.
    Contextualize,
    /// Concatenating the regions.
    Union,
    /// Lifting constraints shared by every region.
    Resolve,
    /// Dropping redundant constraints.
    Minimize,
    /// Comparing solution counts.
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::Contextualize => write!(f, "contextualize"),
            Self::Union => write!(f, "union"),
            Self::Resolve => write!(f, "resolve"),
            Self::Minimize => write!(f, "minimize"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

/// Wall-clock time spent in one stage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StageTiming {
    /// The stage.
    pub stage: Stage,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: f64,
}

impl StageTiming {
    /// Timing for `stage` from `started` until now.
    #[must_use]
    pub fn since(stage: Stage, started: Instant) -> Self {
        Self::new(stage, started.elapsed())
    }

    /// Timing for `stage` from a measured duration.
    #[must_use]
    pub fn new(stage: Stage, elapsed: Duration) -> Self {
        Self {
            stage,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

// ---------------------------------------------------------------------------
// MergeReport
// ---------------------------------------------------------------------------

/// Size of one input model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegionSummary {
    /// The region.
    pub region: RegionId,
    /// Declared features.
    pub features: usize,
    /// Constraints.
    pub constraints: usize,
}

/// Summary of a pipeline run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MergeReport {
    /// Oracle backend name.
    pub oracle: String,
    /// Indicator strategy label.
    pub strategy: String,
    /// Input models, in input order.
    pub regions: Vec<RegionSummary>,
    /// Constraints in the union model.
    pub union_constraints: usize,
    /// Constraints in the output model.
    pub output_constraints: usize,
    /// Output constraints by kind.
    pub output_kinds: KindCounts,
    /// Resolver counters, if the resolver ran.
    pub resolve: Option<ResolveStats>,
    /// Minimizer counters, if the minimizer ran.
    pub minimize: Option<MinimizeStats>,
    /// Oracle calls of any kind, verification included.
    pub oracle_calls: u64,
    /// Oracle calls that ran out of budget.
    pub oracle_timeouts: u64,
    /// A stage stopped early on cancellation.
    pub cancelled: bool,
    /// Per-stage wall-clock time, in execution order.
    pub stages: Vec<StageTiming>,
    /// Verification result, if verification ran.
    pub verification: Option<Verification>,
}

impl MergeReport {
    /// Guarded constraints lifted by the resolver.
    #[must_use]
    pub fn decontextualized(&self) -> usize {
        self.resolve.map_or(0, |s| s.decontextualized)
    }

    /// Constraints removed by the minimizer.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.minimize.map_or(0, |s| s.removed)
    }

    /// Total wall-clock time across stages, in milliseconds.
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.stages.iter().map(|s| s.elapsed_ms).sum()
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "merged {} region(s) with the {} indicator (oracle: {})",
            self.regions.len(),
            self.strategy,
            self.oracle
        )?;
        for r in &self.regions {
            writeln!(
                f,
                "  {}: {} constraints, {} features",
                r.region, r.constraints, r.features
            )?;
        }
        writeln!(f, "union: {} constraints", self.union_constraints)?;
        if let Some(s) = &self.resolve {
            writeln!(
                f,
                "resolve: {} decontextualized ({} duplicates dropped), {} timeouts",
                s.decontextualized, s.duplicates_dropped, s.timeouts
            )?;
        }
        if let Some(s) = &self.minimize {
            writeln!(
                f,
                "minimize: {} removed in {} pass(es), {} timeouts",
                s.removed, s.passes, s.timeouts
            )?;
        }
        let k = &self.output_kinds;
        writeln!(
            f,
            "output: {} constraints ({} ordinary, {} structural, {} custom; {} guarded)",
            self.output_constraints, k.ordinary, k.structural, k.custom, k.contextualized
        )?;
        writeln!(
            f,
            "oracle: {} calls, {} timeouts",
            self.oracle_calls, self.oracle_timeouts
        )?;
        if let Some(v) = &self.verification {
            let status = if v.is_conclusive() { "ok" } else { "inconclusive" };
            write!(f, "verify: {status}")?;
            for check in v.regions.iter().chain(&v.total) {
                write!(
                    f,
                    ", {} {}/{}",
                    check.region,
                    show_count(check.actual),
                    show_count(check.expected)
                )?;
            }
            writeln!(f)?;
        }
        if self.cancelled {
            writeln!(f, "cancelled: output is correct but not fully merged")?;
        }
        write!(f, "time:")?;
        for s in &self.stages {
            write!(f, " {} {:.1}ms", s.stage, s.elapsed_ms)?;
        }
        Ok(())
    }
}

fn show_count(count: Option<u128>) -> String {
    count.map_or_else(|| "?".to_owned(), |n| n.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::verify::CountCheck;

    fn sample() -> MergeReport {
        MergeReport {
            oracle: "enumeration".to_owned(),
            strategy: "integer".to_owned(),
            regions: vec![RegionSummary {
                region: RegionId::new("eu").unwrap(),
                features: 3,
                constraints: 2,
            }],
            union_constraints: 2,
            output_constraints: 2,
            resolve: Some(ResolveStats {
                decontextualized: 1,
                ..ResolveStats::default()
            }),
            minimize: Some(MinimizeStats {
                removed: 1,
                passes: 1,
                ..MinimizeStats::default()
            }),
            stages: vec![StageTiming::new(Stage::Resolve, Duration::from_millis(3))],
            verification: Some(Verification {
                regions: vec![CountCheck {
                    region: RegionId::new("eu").unwrap(),
                    expected: Some(5),
                    actual: Some(5),
                }],
                total: None,
            }),
            ..MergeReport::default()
        }
    }

    #[test]
    fn text_rendering() {
        let text = sample().to_string();
        assert!(text.contains("merged 1 region(s) with the integer indicator"), "{text}");
        assert!(text.contains("eu: 2 constraints, 3 features"), "{text}");
        assert!(text.contains("resolve: 1 decontextualized"), "{text}");
        assert!(text.contains("minimize: 1 removed in 1 pass(es)"), "{text}");
        assert!(text.contains("verify: ok, eu 5/5"), "{text}");
        assert!(text.contains("resolve 3.0ms"), "{text}");
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["strategy"], "integer");
        assert_eq!(json["stages"][0]["stage"], "resolve");
        assert_eq!(json["resolve"]["decontextualized"], 1);
        assert_eq!(json["verification"]["regions"][0]["actual"], 5);
    }

    #[test]
    fn derived_counters() {
        let report = sample();
        assert_eq!(report.decontextualized(), 1);
        assert_eq!(report.removed(), 1);
        assert!((report.total_ms() - 3.0).abs() < 1e-9);
        assert_eq!(MergeReport::default().removed(), 0);
    }
}
