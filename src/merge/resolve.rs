//! Resolution: lift contextualized constraints that hold in every region.
//!
//! A guarded constraint `r = i ⇒ φ` is replaced by the bare `φ` when the
//! model entails `φ` everywhere, which the oracle proves by showing that the
//! current model together with `¬φ` has no solution. Replacing the guarded
//! form by `φ` then neither adds nor removes solutions.
//!
//! The pass visits every constraint once, in model order, and is order
//! sensitive: each decision is made against the constraints accepted so far
//! plus the ones still to come.

use std::time::Instant;

use regionmerge_oracle::{Budget, Constraint, Oracle, Query, Verdict};
use serde::Serialize;
use tracing::instrument;

use crate::error::MergeError;
use crate::merge::types::{CancelFlag, cancelled};
use crate::model::{Model, RegionId};

/// Options for [`resolve`].
#[derive(Clone, Debug, Default)]
pub struct ResolveOptions {
    /// Budget for each oracle call.
    pub budget: Budget,
    /// Cooperative cancellation, checked before each constraint.
    pub cancel: Option<CancelFlag>,
}

/// Counters describing one resolver pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    /// Constraints visited before the pass ended.
    pub visited: usize,
    /// Guarded constraints replaced by their bare condition.
    pub decontextualized: usize,
    /// Lifted constraints dropped because an equal one was already accepted.
    pub duplicates_dropped: usize,
    /// Oracle calls made.
    pub oracle_calls: usize,
    /// Calls that ran out of budget (the constraint was kept guarded).
    pub timeouts: usize,
    /// The pass stopped early on cancellation.
    pub cancelled: bool,
}

/// Result of [`resolve`].
#[derive(Clone, Debug)]
pub struct ResolveOutcome {
    /// The resolved model, tagged [`RegionId::merged`].
    pub model: Model,
    /// Pass counters.
    pub stats: ResolveStats,
}

/// Run one resolution pass over `union`.
///
/// # Errors
/// Propagates [`MergeError::Oracle`] when the oracle fails. Timeouts are not
/// errors: the constraint stays guarded and the timeout is counted.
#[instrument(skip_all, fields(constraints = union.constraints.len()))]
pub fn resolve(
    union: Model,
    oracle: &dyn Oracle,
    options: &ResolveOptions,
) -> Result<ResolveOutcome, MergeError> {
    let started = Instant::now();
    let Model {
        root,
        features,
        constraints,
        ..
    } = union;

    let mut stats = ResolveStats::default();
    let mut accepted: Vec<Constraint> = Vec::with_capacity(constraints.len());
    let mut remaining = constraints.into_iter();

    while let Some(c) = remaining.next() {
        if cancelled(options.cancel.as_ref()) {
            tracing::info!(visited = stats.visited, "resolution cancelled");
            stats.cancelled = true;
            accepted.push(c);
            accepted.extend(remaining);
            break;
        }
        stats.visited += 1;

        if !c.is_mergeable() || !c.is_contextualized() {
            accepted.push(c);
            continue;
        }

        let lifted = c.decontextualized();
        let rest = remaining.as_slice();
        let mut test = Vec::with_capacity(accepted.len() + rest.len() + 2);
        test.extend_from_slice(&accepted);
        test.push(c.clone());
        test.extend_from_slice(rest);
        test.push(lifted.negated_copy());

        stats.oracle_calls += 1;
        let verdict = oracle.decide(&Query::new(&test, &features).with_budget(options.budget))?;
        tracing::trace!(constraint = %c, verdict = verdict.label(), "entailment checked");

        match verdict {
            Verdict::Unsat => {
                stats.decontextualized += 1;
                if accepted.contains(&lifted) {
                    stats.duplicates_dropped += 1;
                } else {
                    accepted.push(lifted);
                }
            }
            Verdict::Sat(_) => accepted.push(c),
            Verdict::Timeout => {
                stats.timeouts += 1;
                accepted.push(c);
            }
        }
    }

    tracing::info!(
        decontextualized = stats.decontextualized,
        duplicates_dropped = stats.duplicates_dropped,
        timeouts = stats.timeouts,
        elapsed = ?started.elapsed(),
        "resolution finished"
    );

    Ok(ResolveOutcome {
        model: Model {
            region: RegionId::merged(),
            root,
            features,
            constraints: accepted,
        },
        stats,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
