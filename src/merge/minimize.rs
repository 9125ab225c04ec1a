//! Minimization: drop ordinary constraints implied by the rest of the model.

use std::time::Instant;

use regionmerge_oracle::{Budget, Oracle, Query, Verdict};
use serde::Serialize;
use tracing::instrument;

use crate::error::MergeError;
use crate::merge::types::{CancelFlag, cancelled};
use crate::model::Model;

/// Options for [`minimize`].
#[derive(Clone, Debug)]
pub struct MinimizeOptions {
    /// Budget for each oracle call.
    pub budget: Budget,
    /// Cooperative cancellation, checked before each constraint.
    pub cancel: Option<CancelFlag>,
    /// Repeat passes until one removes nothing.
    pub fixed_point: bool,
    /// Pass limit when `fixed_point` is set.
    pub max_passes: usize,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        Self {
            budget: Budget::unlimited(),
            cancel: None,
            fixed_point: false,
            max_passes: 8,
        }
    }
}

/// Counters describing a minimizer run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MinimizeStats {
    /// Passes started.
    pub passes: usize,
    /// Constraints removed as redundant.
    pub removed: usize,
    /// Oracle calls made.
    pub oracle_calls: usize,
    /// Calls that ran out of budget (the constraint was kept).
    pub timeouts: usize,
    /// The run stopped early on cancellation.
    pub cancelled: bool,
}

/// Result of [`minimize`].
#[derive(Clone, Debug)]
pub struct MinimizeOutcome {
    /// The minimized model.
    pub model: Model,
    /// Run counters.
    pub stats: MinimizeStats,
}

/// Remove every ordinary constraint entailed by the rest of `model`.
///
/// Each ordinary constraint `c` is tested once per pass, in order, by asking
/// whether the model with `c` replaced by its negation has a solution. If
/// not, `c` is implied by the others and is removed for good. Structural and
/// custom constraints are never removed.
///
/// # Errors
/// Propagates [`MergeError::Oracle`]; timeouts keep the constraint.
#[instrument(skip_all, fields(region = %model.region, constraints = model.constraints.len()))]
pub fn minimize(
    mut model: Model,
    oracle: &dyn Oracle,
    options: &MinimizeOptions,
) -> Result<MinimizeOutcome, MergeError> {
    let started = Instant::now();
    let mut stats = MinimizeStats::default();
    let max_passes = if options.fixed_point {
        options.max_passes.max(1)
    } else {
        1
    };

    while stats.passes < max_passes {
        stats.passes += 1;
        let removed = minimize_pass(&mut model, oracle, options, &mut stats)?;
        tracing::debug!(pass = stats.passes, removed, "minimizer pass done");
        if removed == 0 || stats.cancelled {
            break;
        }
    }

    tracing::info!(
        removed = stats.removed,
        passes = stats.passes,
        timeouts = stats.timeouts,
        elapsed = ?started.elapsed(),
        "minimization finished"
    );
    Ok(MinimizeOutcome { model, stats })
}

fn minimize_pass(
    model: &mut Model,
    oracle: &dyn Oracle,
    options: &MinimizeOptions,
    stats: &mut MinimizeStats,
) -> Result<usize, MergeError> {
    let mut removed = 0;
    let mut i = 0;
    while i < model.constraints.len() {
        if cancelled(options.cancel.as_ref()) {
            tracing::info!(position = i, "minimization cancelled");
            stats.cancelled = true;
            break;
        }
        if !model.constraints[i].is_mergeable() {
            i += 1;
            continue;
        }

        let mut test = model.constraints.clone();
        test[i] = test[i].negated_copy();
        stats.oracle_calls += 1;
        let verdict =
            oracle.decide(&Query::new(&test, &model.features).with_budget(options.budget))?;
        tracing::trace!(constraint = %model.constraints[i], verdict = verdict.label(), "redundancy checked");

        match verdict {
            Verdict::Unsat => {
                model.constraints.remove(i);
                removed += 1;
                stats.removed += 1;
            }
            Verdict::Sat(_) => i += 1,
            Verdict::Timeout => {
                stats.timeouts += 1;
                i += 1;
            }
        }
    }
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use regionmerge_oracle::{
        CmpOp, Condition, Constraint, CountingOracle, Domain, EnumerationOracle, FeatureName,
    };

    use super::*;
    use crate::model::RegionId;

    fn name(s: &str) -> FeatureName {
        FeatureName::new(s).unwrap()
    }

    fn cmp(feature: &str, op: CmpOp, value: i64) -> Constraint {
        Constraint::new(Condition::compare(name(feature), op, value))
    }

    fn base() -> Model {
        Model::new(RegionId::merged()).with_feature(name("x"), Domain::range(0, 9).unwrap())
    }

    fn count(model: &Model) -> u128 {
        EnumerationOracle::new()
            .count(&model.query())
            .unwrap()
            .exact()
            .unwrap()
    }

    #[test]
    fn removes_implied_constraint() {
        let model = base()
            .with_constraint(cmp("x", CmpOp::Lt, 5))
            .with_constraint(cmp("x", CmpOp::Lt, 3));
        let before = count(&model);
        let out = minimize(model, &EnumerationOracle::new(), &MinimizeOptions::default()).unwrap();
        assert_eq!(out.model.constraints, vec![cmp("x", CmpOp::Lt, 3)]);
        assert_eq!(out.stats.removed, 1);
        assert_eq!(count(&out.model), before);
    }

    #[test]
    fn duplicates_collapse_to_one() {
        let model = base()
            .with_constraint(cmp("x", CmpOp::Ne, 4))
            .with_constraint(cmp("x", CmpOp::Ne, 4));
        let out = minimize(model, &EnumerationOracle::new(), &MinimizeOptions::default()).unwrap();
        assert_eq!(out.model.len(), 1);
    }

    #[test]
    fn remaining_constraints_are_irredundant() {
        let model = base()
            .with_feature(name("y"), Domain::Bool)
            .with_constraint(cmp("x", CmpOp::Ge, 2))
            .with_constraint(cmp("x", CmpOp::Ge, 1))
            .with_constraint(Constraint::new(Condition::implies(
                Condition::compare(name("x"), CmpOp::Eq, 0),
                Condition::Selected(name("y")),
            )))
            .with_constraint(cmp("x", CmpOp::Le, 7));
        let out = minimize(model, &EnumerationOracle::new(), &MinimizeOptions::default()).unwrap();
        let total = count(&out.model);
        for i in 0..out.model.len() {
            let mut without = out.model.clone();
            without.constraints.remove(i);
            assert!(count(&without) > total, "constraint {i} is redundant");
        }
        assert_eq!(
            out.model.constraints,
            vec![cmp("x", CmpOp::Ge, 2), cmp("x", CmpOp::Le, 7)]
        );
    }

    #[test]
    fn structural_constraints_survive() {
        let model = base()
            .with_feature(name("Car"), Domain::Bool)
            .with_constraint(Constraint::structural(Condition::Selected(name("Car"))))
            .with_constraint(Constraint::structural(Condition::Selected(name("Car"))));
        let out = minimize(model, &EnumerationOracle::new(), &MinimizeOptions::default()).unwrap();
        assert_eq!(out.model.len(), 2);
        assert_eq!(out.stats.oracle_calls, 0);
    }

    #[test]
    fn one_call_per_ordinary_constraint() {
        let oracle = CountingOracle::new(EnumerationOracle::new());
        let model = base()
            .with_constraint(cmp("x", CmpOp::Lt, 5))
            .with_constraint(cmp("x", CmpOp::Lt, 3))
            .with_constraint(cmp("x", CmpOp::Ne, 1));
        minimize(model, &oracle, &MinimizeOptions::default()).unwrap();
        assert_eq!(oracle.stats().decide_calls, 3);
    }

    #[test]
    fn timeouts_keep_everything() {
        let model = base()
            .with_constraint(cmp("x", CmpOp::Lt, 5))
            .with_constraint(cmp("x", CmpOp::Lt, 3));
        let options = MinimizeOptions {
            budget: Budget::unlimited().with_max_steps(0),
            ..MinimizeOptions::default()
        };
        let out = minimize(model.clone(), &EnumerationOracle::new(), &options).unwrap();
        assert_eq!(out.model, model);
        assert_eq!(out.stats.timeouts, 2);
    }

    #[test]
    fn cancelled_run_is_unchanged() {
        let model = base()
            .with_constraint(cmp("x", CmpOp::Lt, 5))
            .with_constraint(cmp("x", CmpOp::Lt, 3));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let options = MinimizeOptions {
            cancel: Some(cancel),
            ..MinimizeOptions::default()
        };
        let out = minimize(model.clone(), &EnumerationOracle::new(), &options).unwrap();
        assert!(out.stats.cancelled);
        assert_eq!(out.model, model);
    }

    #[test]
    fn fixed_point_stops_when_nothing_changes() {
        let model = base()
            .with_constraint(cmp("x", CmpOp::Lt, 5))
            .with_constraint(cmp("x", CmpOp::Lt, 3));
        let options = MinimizeOptions {
            fixed_point: true,
            ..MinimizeOptions::default()
        };
        let out = minimize(model, &EnumerationOracle::new(), &options).unwrap();
        assert_eq!(out.stats.passes, 2);
        assert_eq!(out.model.len(), 1);
    }
}
