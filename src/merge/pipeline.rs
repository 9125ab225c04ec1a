//! The full merge pipeline:
//!
//! ```text
//! validate → base check → contextualize → union → resolve → minimize → verify
//! ```
//!
//! Every stage consumes the previous stage's model by value. Oracle calls go
//! through a [`CountingOracle`] so the report can state how many were made.

use std::collections::BTreeSet;
use std::time::Instant;

use regionmerge_oracle::{Budget, CountingOracle, Oracle, Verdict};
use tracing::instrument;

use crate::error::MergeError;
use crate::merge::contextualize::contextualize;
use crate::merge::minimize::{MinimizeOptions, minimize};
use crate::merge::report::{MergeReport, RegionSummary, Stage, StageTiming};
use crate::merge::resolve::{ResolveOptions, resolve};
use crate::merge::types::{Indicator, MergeOptions, cancelled};
use crate::merge::union::union_all;
use crate::merge::verify::verify;
use crate::model::{Model, RegionId};

/// The merged model and what it took to build it.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    /// The merged model, tagged [`RegionId::merged`].
    pub model: Model,
    /// Run summary.
    pub report: MergeReport,
}

/// Merge `models` into one model whose solutions are exactly the union of
/// the regions' solutions.
///
/// # Errors
/// - [`MergeError::NoModels`] / [`MergeError::DuplicateRegion`] for bad input sets.
/// - [`MergeError::Model`] if an input is invalid or uses a reserved region id.
/// - [`MergeError::BaseModelUnsatisfiable`] / [`MergeError::BaseModelUndecided`]
///   from the base check.
/// - Stage errors (domain or root mismatches, oracle failures, verification).
#[instrument(skip_all, fields(regions = models.len(), strategy = %options.strategy))]
pub fn merge(
    models: Vec<Model>,
    oracle: &dyn Oracle,
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    let oracle = CountingOracle::new(oracle);
    let mut report = MergeReport {
        oracle: oracle.name().to_owned(),
        strategy: options.strategy.label().to_owned(),
        ..MergeReport::default()
    };

    // Validate
    let started = Instant::now();
    validate_inputs(&models)?;
    if options.check_base {
        for model in &models {
            check_satisfiable(model, &oracle, options.budget)?;
        }
    }
    report.regions = models
        .iter()
        .map(|m| RegionSummary {
            region: m.region.clone(),
            features: m.features.len(),
            constraints: m.len(),
        })
        .collect();
    report.stages.push(StageTiming::since(Stage::Validate, started));

    // Contextualize
    let started = Instant::now();
    let count = models.len();
    let mut sources: Vec<(Model, Indicator)> = Vec::new();
    let mut contextualized = Vec::with_capacity(count);
    for (position, model) in models.into_iter().enumerate() {
        let indicator = options.strategy.indicator(position, count)?;
        reject_declared_indicator(&model, &indicator)?;
        if options.verify {
            sources.push((model.clone(), indicator.clone()));
        }
        contextualized.push(contextualize(model, &indicator)?);
    }
    report.stages.push(StageTiming::since(Stage::Contextualize, started));

    // Union
    let started = Instant::now();
    let union = union_all(contextualized, RegionId::union())?;
    report.union_constraints = union.len();
    report.stages.push(StageTiming::since(Stage::Union, started));

    // Resolve
    let mut model = if options.resolve {
        let started = Instant::now();
        let resolve_options = ResolveOptions {
            budget: options.budget,
            cancel: options.cancel.clone(),
        };
        let outcome = resolve(union, &oracle, &resolve_options)?;
        report.cancelled |= outcome.stats.cancelled;
        report.resolve = Some(outcome.stats);
        report.stages.push(StageTiming::since(Stage::Resolve, started));
        outcome.model
    } else {
        union.retagged(RegionId::merged())
    };

    // Minimize
    if options.minimize && !cancelled(options.cancel.as_ref()) {
        let started = Instant::now();
        let minimize_options = MinimizeOptions {
            budget: options.budget,
            cancel: options.cancel.clone(),
            fixed_point: options.fixed_point,
            max_passes: options.max_passes,
        };
        let outcome = minimize(model, &oracle, &minimize_options)?;
        report.cancelled |= outcome.stats.cancelled;
        report.minimize = Some(outcome.stats);
        report.stages.push(StageTiming::since(Stage::Minimize, started));
        model = outcome.model;
    }

    // Verify
    if options.verify && !report.cancelled {
        let started = Instant::now();
        report.verification = Some(verify(&model, &sources, &oracle, options.budget)?);
        report.stages.push(StageTiming::since(Stage::Verify, started));
    }

    let stats = oracle.stats();
    report.oracle_calls = stats.decide_calls + stats.count_calls;
    report.oracle_timeouts = stats.timeouts;
    report.output_constraints = model.len();
    report.output_kinds = model.kind_counts();

    tracing::info!(
        union = report.union_constraints,
        output = report.output_constraints,
        oracle_calls = report.oracle_calls,
        cancelled = report.cancelled,
        "merge complete"
    );
    Ok(MergeOutcome { model, report })
}

/// Reject empty input sets, reserved or repeated region ids, and models that
/// reference undeclared features.
fn validate_inputs(models: &[Model]) -> Result<(), MergeError> {
    if models.is_empty() {
        return Err(MergeError::NoModels);
    }
    let mut seen = BTreeSet::new();
    for model in models {
        RegionId::user(model.region.as_str())?;
        if !seen.insert(&model.region) {
            return Err(MergeError::DuplicateRegion {
                region: model.region.clone(),
            });
        }
        model.validate()?;
    }
    Ok(())
}

/// An input model must not already declare a feature the indicator adds,
/// whatever its domain: the merged model would alias it with the region
/// selector.
fn reject_declared_indicator(model: &Model, indicator: &Indicator) -> Result<(), MergeError> {
    for feature in indicator.features(&model.region)? {
        if model.features.contains_key(&feature) {
            return Err(MergeError::IndicatorClash {
                region: model.region.clone(),
                feature,
            });
        }
    }
    Ok(())
}

/// Check that `model` has at least one solution.
///
/// # Errors
/// [`MergeError::BaseModelUnsatisfiable`] if it has none,
/// [`MergeError::BaseModelUndecided`] if the oracle ran out of budget, or
/// [`MergeError::Oracle`] on backend failure.
#[instrument(skip_all, fields(region = %model.region))]
pub fn check_satisfiable(
    model: &Model,
    oracle: &dyn Oracle,
    budget: Budget,
) -> Result<(), MergeError> {
    match oracle.decide(&model.query().with_budget(budget))? {
        Verdict::Sat(_) => Ok(()),
        Verdict::Unsat => Err(MergeError::BaseModelUnsatisfiable {
            region: model.region.clone(),
        }),
        Verdict::Timeout => Err(MergeError::BaseModelUndecided {
            region: model.region.clone(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// One independent merge of a batch.
#[derive(Clone, Debug)]
pub struct MergeJob {
    /// Caller-chosen label, returned with the result.
    pub label: String,
    /// The region models to merge.
    pub models: Vec<Model>,
}

/// Run independent merges concurrently, one scoped thread per job.
///
/// Each job owns its models; only the oracle and the options are shared.
/// Results come back in job order.
pub fn merge_batch(
    jobs: Vec<MergeJob>,
    oracle: &(dyn Oracle + Sync),
    options: &MergeOptions,
) -> Vec<(String, Result<MergeOutcome, MergeError>)> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let label = job.label;
                let handle = scope.spawn(move || merge(job.models, oracle, options));
                (label, handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(label, handle)| {
                let result = handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                (label, result)
            })
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
