//! Verification: compare solution counts of the merged model against the
//! source models.
//!
//! For each region, the merged model restricted to the region's indicator
//! must have exactly as many solutions as the source model counted over the
//! merged universe (every merged feature except the indicator features).
//! Structural constraints are never guarded, so the structural constraints
//! of the other regions count as part of each region's model. With the
//! integer strategy the unrestricted total must also equal the sum of the
//! region counts. A count that runs out of budget makes the check
//! inconclusive, not failed.

use std::collections::{BTreeMap, BTreeSet};

use regionmerge_oracle::{Budget, Constraint, CountVerdict, Domain, FeatureName, Oracle, Query};
use serde::Serialize;
use tracing::instrument;

use crate::error::MergeError;
use crate::merge::types::Indicator;
use crate::model::{Model, RegionId};

/// Expected and actual solution counts for one region (or the total).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CountCheck {
    /// The region, or `merged` for the total.
    pub region: RegionId,
    /// Count derived from the source model; `None` if the count timed out.
    pub expected: Option<u128>,
    /// Count of the merged model; `None` if the count timed out.
    pub actual: Option<u128>,
}

impl CountCheck {
    /// Returns `true` when both counts are known.
    #[must_use]
    pub const fn is_conclusive(&self) -> bool {
        self.expected.is_some() && self.actual.is_some()
    }
}

/// Result of [`verify`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Verification {
    /// One check per source region, in input order.
    pub regions: Vec<CountCheck>,
    /// Total check (integer strategy only).
    pub total: Option<CountCheck>,
}

impl Verification {
    /// Returns `true` when every check completed within budget.
    #[must_use]
    pub fn is_conclusive(&self) -> bool {
        self.regions.iter().chain(&self.total).all(CountCheck::is_conclusive)
    }
}

/// Check that `merged` reproduces each source's solutions.
///
/// `sources` pairs every original (uncontextualized) model with the
/// indicator it was contextualized with.
///
/// # Errors
/// - [`MergeError::VerificationFailed`] on the first count mismatch.
/// - [`MergeError::MissingRoot`] for a feature-tree source without root.
/// - [`MergeError::Oracle`] if counting fails.
#[instrument(skip_all, fields(regions = sources.len()))]
pub fn verify(
    merged: &Model,
    sources: &[(Model, Indicator)],
    oracle: &dyn Oracle,
    budget: Budget,
) -> Result<Verification, MergeError> {
    let mut indicator_features = BTreeSet::new();
    for (model, indicator) in sources {
        indicator_features.insert(indicator.selector(&model.region)?.0);
        if let Indicator::FeatureTree { region_root } = indicator {
            indicator_features.insert(region_root.clone());
        }
    }
    let universe: BTreeMap<FeatureName, Domain> = merged
        .features
        .iter()
        .filter(|(name, _)| !indicator_features.contains(*name))
        .map(|(name, domain)| (name.clone(), *domain))
        .collect();

    let mut verification = Verification::default();
    let mut integer_only = true;
    for (position, (model, indicator)) in sources.iter().enumerate() {
        let selector = [indicator.selector(&model.region)?];
        let restricted = merged
            .query()
            .with_assumptions(&selector)
            .with_budget(budget);
        let actual = count(oracle, &restricted)?;

        let mut constraints: Vec<Constraint> = model.constraints.clone();
        for (i, (other, _)) in sources.iter().enumerate() {
            if i != position {
                constraints.extend(other.constraints.iter().filter(|c| !c.is_mergeable()).cloned());
            }
        }
        let root_selected;
        let assumptions: &[(FeatureName, i64)] = match indicator {
            Indicator::Integer { .. } => &[],
            Indicator::FeatureTree { .. } => {
                integer_only = false;
                let root = model.root.clone().ok_or_else(|| MergeError::MissingRoot {
                    region: model.region.clone(),
                })?;
                root_selected = [(root, 1)];
                &root_selected
            }
        };
        let source_query = Query::new(&constraints, &universe)
            .with_assumptions(assumptions)
            .with_budget(budget);
        let expected = count(oracle, &source_query)?;

        let check = CountCheck {
            region: model.region.clone(),
            expected,
            actual,
        };
        ensure_match(&check)?;
        tracing::debug!(region = %model.region, ?expected, ?actual, "region verified");
        verification.regions.push(check);
    }

    if integer_only {
        let actual = count(oracle, &merged.query().with_budget(budget))?;
        let expected = verification
            .regions
            .iter()
            .try_fold(0u128, |sum, check| Some(sum.saturating_add(check.expected?)));
        let check = CountCheck {
            region: RegionId::merged(),
            expected,
            actual,
        };
        ensure_match(&check)?;
        verification.total = Some(check);
    }

    if !verification.is_conclusive() {
        tracing::warn!("verification inconclusive: a count ran out of budget");
    }
    Ok(verification)
}

fn count(oracle: &dyn Oracle, query: &Query<'_>) -> Result<Option<u128>, MergeError> {
    Ok(match oracle.count(query)? {
        CountVerdict::Exact(n) => Some(n),
        CountVerdict::Timeout => None,
    })
}

fn ensure_match(check: &CountCheck) -> Result<(), MergeError> {
    match (check.expected, check.actual) {
        (Some(expected), Some(actual)) if expected != actual => {
            Err(MergeError::VerificationFailed {
                region: check.region.clone(),
                expected,
                actual,
            })
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
