//! The [`Oracle`] trait: the single abstraction boundary between the merge
//! pipeline and constraint solving.
//!
//! The pipeline asks two kinds of questions:
//!
//! | Question | Method | Used by |
//! |----------|--------|---------|
//! | Is this set satisfiable? | [`Oracle::decide`] | resolve, minimize, base check |
//! | How many solutions? | [`Oracle::count`] | verification, tests |
//!
//! Both are bounded by a [`Budget`]. Exhausting the budget is a verdict
//! ([`Verdict::Timeout`]), not an error: callers must treat it as "unknown"
//! and take their conservative branch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::error::OracleError;
use crate::types::{Assignment, Constraint, Domain, FeatureName};

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Resource bound for a single oracle call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Budget {
    /// Wall-clock limit. `None` means unlimited.
    pub timeout: Option<Duration>,
    /// Search-step limit (backend-defined unit). `None` means unlimited.
    pub max_steps: Option<u64>,
}

impl Budget {
    /// No limits.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            timeout: None,
            max_steps: None,
        }
    }

    /// Set the wall-clock limit.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the step limit.
    #[must_use]
    pub const fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Returns `true` if neither limit is set.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.timeout.is_none() && self.max_steps.is_none()
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// One oracle question: a conjunction of constraints over declared domains.
#[derive(Clone, Copy, Debug)]
pub struct Query<'a> {
    /// Constraints that must all hold.
    pub constraints: &'a [Constraint],
    /// The variable universe. Every feature a constraint mentions must be here.
    pub domains: &'a BTreeMap<FeatureName, Domain>,
    /// Features fixed to a value for this query only.
    pub assumptions: &'a [(FeatureName, i64)],
    /// Resource bound.
    pub budget: Budget,
}

impl<'a> Query<'a> {
    /// A query with no assumptions and an unlimited budget.
    #[must_use]
    pub const fn new(constraints: &'a [Constraint], domains: &'a BTreeMap<FeatureName, Domain>) -> Self {
        Self {
            constraints,
            domains,
            assumptions: &[],
            budget: Budget::unlimited(),
        }
    }

    /// Fix some features to given values.
    #[must_use]
    pub const fn with_assumptions(mut self, assumptions: &'a [(FeatureName, i64)]) -> Self {
        self.assumptions = assumptions;
        self
    }

    /// Bound the query.
    #[must_use]
    pub const fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }
}

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

/// Outcome of [`Oracle::decide`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// At least one solution exists; carries a witness.
    Sat(Assignment),
    /// No solution exists.
    Unsat,
    /// The budget ran out before a decision was reached.
    Timeout,
}

impl Verdict {
    /// Returns `true` for [`Verdict::Sat`].
    #[must_use]
    pub const fn is_sat(&self) -> bool {
        matches!(self, Self::Sat(_))
    }

    /// Returns `true` for [`Verdict::Unsat`].
    #[must_use]
    pub const fn is_unsat(&self) -> bool {
        matches!(self, Self::Unsat)
    }

    /// Returns `true` for [`Verdict::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Short lowercase label, for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Sat(_) => "sat",
            Self::Unsat => "unsat",
            Self::Timeout => "timeout",
        }
    }
}

/// Outcome of [`Oracle::count`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountVerdict {
    /// The exact number of solutions (saturating at `u128::MAX`).
    Exact(u128),
    /// The budget ran out before counting finished.
    Timeout,
}

impl CountVerdict {
    /// The exact count, if known.
    #[must_use]
    pub const fn exact(self) -> Option<u128> {
        match self {
            Self::Exact(n) => Some(n),
            Self::Timeout => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// A satisfiability decision procedure.
///
/// # Object safety
///
/// This trait is object-safe; the pipeline holds `&dyn Oracle`.
pub trait Oracle {
    /// Decide whether all constraints of `query` can hold at once.
    ///
    /// # Errors
    /// Returns [`OracleError`] for malformed queries or backend failures.
    /// Budget exhaustion is reported as [`Verdict::Timeout`], not an error.
    fn decide(&self, query: &Query<'_>) -> Result<Verdict, OracleError>;

    /// Count the assignments of `query.domains` satisfying every constraint.
    ///
    /// # Errors
    /// Same as [`Oracle::decide`].
    fn count(&self, query: &Query<'_>) -> Result<CountVerdict, OracleError>;

    /// Human-readable backend name, for reports.
    fn name(&self) -> &'static str {
        "oracle"
    }
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn decide(&self, query: &Query<'_>) -> Result<Verdict, OracleError> {
        (**self).decide(query)
    }

    fn count(&self, query: &Query<'_>) -> Result<CountVerdict, OracleError> {
        (**self).count(query)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

// ---------------------------------------------------------------------------
// CountingOracle
// ---------------------------------------------------------------------------

/// Snapshot of the calls seen by a [`CountingOracle`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OracleStats {
    /// Number of `decide` calls.
    pub decide_calls: u64,
    /// Number of `count` calls.
    pub count_calls: u64,
    /// `decide` calls answered SAT.
    pub sat: u64,
    /// `decide` calls answered UNSAT.
    pub unsat: u64,
    /// Calls of either kind that ran out of budget.
    pub timeouts: u64,
}

/// Wraps another oracle and counts its calls and verdicts.
///
/// Counters are atomic so the wrapper can be shared across threads when the
/// inner oracle is `Sync`.
#[derive(Debug, Default)]
pub struct CountingOracle<O> {
    inner: O,
    decide_calls: AtomicU64,
    count_calls: AtomicU64,
    sat: AtomicU64,
    unsat: AtomicU64,
    timeouts: AtomicU64,
}

impl<O: Oracle> CountingOracle<O> {
    /// Wrap `inner`.
    pub const fn new(inner: O) -> Self {
        Self {
            inner,
            decide_calls: AtomicU64::new(0),
            count_calls: AtomicU64::new(0),
            sat: AtomicU64::new(0),
            unsat: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    /// Current counters.
    pub fn stats(&self) -> OracleStats {
        OracleStats {
            decide_calls: self.decide_calls.load(Ordering::Relaxed),
            count_calls: self.count_calls.load(Ordering::Relaxed),
            sat: self.sat.load(Ordering::Relaxed),
            unsat: self.unsat.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }

    /// Unwrap the inner oracle.
    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: Oracle> Oracle for CountingOracle<O> {
    fn decide(&self, query: &Query<'_>) -> Result<Verdict, OracleError> {
        self.decide_calls.fetch_add(1, Ordering::Relaxed);
        let verdict = self.inner.decide(query)?;
        let counter = match verdict {
            Verdict::Sat(_) => &self.sat,
            Verdict::Unsat => &self.unsat,
            Verdict::Timeout => &self.timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(verdict)
    }

    fn count(&self, query: &Query<'_>) -> Result<CountVerdict, OracleError> {
        self.count_calls.fetch_add(1, Ordering::Relaxed);
        let verdict = self.inner.count(query)?;
        if verdict == CountVerdict::Timeout {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
        Ok(verdict)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
