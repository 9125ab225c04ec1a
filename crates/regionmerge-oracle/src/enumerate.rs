//! Exhaustive backtracking backend.
//!
//! [`EnumerationOracle`] assigns features depth-first in name order and checks
//! each constraint as soon as every feature it mentions has a value. Features
//! no constraint mentions are left out of the search and contribute their
//! domain size as a factor when counting.
//!
//! Intended for the small finite domains of configuration models; it is the
//! reference semantics other backends are tested against, not a fast solver.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::trace;

use crate::error::OracleError;
use crate::oracle::{Budget, CountVerdict, Oracle, Query, Verdict};
use crate::types::{Assignment, Constraint, FeatureName};

/// Deadline checks happen every `CLOCK_STRIDE` steps.
const CLOCK_STRIDE: u64 = 256;

/// Exhaustive search over finite domains.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnumerationOracle;

impl EnumerationOracle {
    /// Create the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Oracle for EnumerationOracle {
    fn decide(&self, query: &Query<'_>) -> Result<Verdict, OracleError> {
        let mut search = Search::prepare(query)?;
        if !search.ground_holds() {
            return Ok(Verdict::Unsat);
        }
        let verdict = match search.first(0) {
            Step::Found => Verdict::Sat(search.witness()),
            Step::Exhausted => Verdict::Unsat,
            Step::OutOfBudget => Verdict::Timeout,
        };
        trace!(
            constraints = query.constraints.len(),
            steps = search.meter.steps,
            verdict = verdict.label(),
            "enumeration decide"
        );
        Ok(verdict)
    }

    fn count(&self, query: &Query<'_>) -> Result<CountVerdict, OracleError> {
        let mut search = Search::prepare(query)?;
        if !search.ground_holds() {
            return Ok(CountVerdict::Exact(0));
        }
        let verdict = match search.count_from(0) {
            Some(n) => CountVerdict::Exact(n.saturating_mul(search.free_factor())),
            None => CountVerdict::Timeout,
        };
        trace!(
            constraints = query.constraints.len(),
            steps = search.meter.steps,
            ?verdict,
            "enumeration count"
        );
        Ok(verdict)
    }

    fn name(&self) -> &'static str {
        "enumeration"
    }
}

// ---------------------------------------------------------------------------
// Search state
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Found,
    Exhausted,
    OutOfBudget,
}

struct Var<'q> {
    name: &'q FeatureName,
    min: i64,
    max: i64,
}

impl Var<'_> {
    fn size(&self) -> u128 {
        u128::try_from(i128::from(self.max) - i128::from(self.min) + 1).unwrap_or(0)
    }
}

struct Meter {
    steps: u64,
    max_steps: Option<u64>,
    deadline: Option<Instant>,
}

impl Meter {
    fn new(budget: Budget) -> Self {
        Self {
            steps: 0,
            max_steps: budget.max_steps,
            deadline: budget.timeout.map(|t| Instant::now() + t),
        }
    }

    /// Count one step; returns `true` once the budget is exhausted.
    fn tick(&mut self) -> bool {
        self.steps += 1;
        if self.max_steps.is_some_and(|max| self.steps > max) {
            return true;
        }
        self.steps % CLOCK_STRIDE == 0 && self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

struct Search<'q> {
    /// Searched variables, in assignment order.
    vars: Vec<Var<'q>>,
    /// Variables no constraint mentions.
    free: Vec<Var<'q>>,
    slots: HashMap<&'q FeatureName, usize>,
    /// `checks[i]` holds the constraints whose last feature is `vars[i]`.
    checks: Vec<Vec<&'q Constraint>>,
    /// Constraints mentioning no feature at all.
    ground: Vec<&'q Constraint>,
    values: Vec<i64>,
    meter: Meter,
}

impl<'q> Search<'q> {
    fn prepare(query: &Query<'q>) -> Result<Self, OracleError> {
        let mut mentioned: HashSet<&'q FeatureName> = HashSet::new();
        for constraint in query.constraints {
            for feature in constraint.features() {
                if !query.domains.contains_key(feature) {
                    return Err(OracleError::UnknownFeature {
                        feature: feature.clone(),
                    });
                }
                mentioned.insert(feature);
            }
        }

        let mut fixed: HashMap<&'q FeatureName, i64> = HashMap::new();
        for (feature, value) in query.assumptions {
            let Some(domain) = query.domains.get(feature) else {
                return Err(OracleError::UnknownFeature {
                    feature: feature.clone(),
                });
            };
            if !domain.contains(*value) {
                return Err(OracleError::ValueOutOfDomain {
                    feature: feature.clone(),
                    value: *value,
                    domain: *domain,
                });
            }
            fixed.insert(feature, *value);
        }

        let mut vars = Vec::new();
        let mut free = Vec::new();
        for (name, domain) in query.domains {
            if domain.is_empty() {
                return Err(OracleError::EmptyDomain {
                    feature: name.clone(),
                });
            }
            let (min, max) = match fixed.get(name) {
                Some(&v) => (v, v),
                None => domain.bounds(),
            };
            let var = Var { name, min, max };
            if mentioned.contains(name) {
                vars.push(var);
            } else {
                free.push(var);
            }
        }

        let slots: HashMap<&'q FeatureName, usize> =
            vars.iter().enumerate().map(|(i, v)| (v.name, i)).collect();
        let mut checks: Vec<Vec<&'q Constraint>> = vars.iter().map(|_| Vec::new()).collect();
        let mut ground = Vec::new();
        for constraint in query.constraints {
            let last = constraint
                .features()
                .into_iter()
                .filter_map(|f| slots.get(f).copied())
                .max();
            match last {
                Some(level) => checks[level].push(constraint),
                None => ground.push(constraint),
            }
        }

        let values = vars.iter().map(|v| v.min).collect();
        Ok(Self {
            vars,
            free,
            slots,
            checks,
            ground,
            values,
            meter: Meter::new(query.budget),
        })
    }

    fn value_of(&self, feature: &FeatureName) -> Option<i64> {
        self.slots.get(feature).map(|&i| self.values[i])
    }

    fn ground_holds(&self) -> bool {
        let lookup = |f: &FeatureName| self.value_of(f);
        self.ground.iter().all(|c| c.holds(&lookup) == Some(true))
    }

    fn consistent(&self, level: usize) -> bool {
        let lookup = |f: &FeatureName| self.value_of(f);
        self.checks[level]
            .iter()
            .all(|c| c.holds(&lookup) == Some(true))
    }

    fn first(&mut self, level: usize) -> Step {
        if level == self.vars.len() {
            return Step::Found;
        }
        let (min, max) = (self.vars[level].min, self.vars[level].max);
        for v in min..=max {
            if self.meter.tick() {
                return Step::OutOfBudget;
            }
            self.values[level] = v;
            if self.consistent(level) {
                match self.first(level + 1) {
                    Step::Exhausted => {}
                    done => return done,
                }
            }
        }
        Step::Exhausted
    }

    /// Number of solutions below `level`, or `None` when out of budget.
    fn count_from(&mut self, level: usize) -> Option<u128> {
        if level == self.vars.len() {
            return Some(1);
        }
        let (min, max) = (self.vars[level].min, self.vars[level].max);
        let mut total: u128 = 0;
        for v in min..=max {
            if self.meter.tick() {
                return None;
            }
            self.values[level] = v;
            if self.consistent(level) {
                total = total.saturating_add(self.count_from(level + 1)?);
            }
        }
        Some(total)
    }

    fn free_factor(&self) -> u128 {
        self.free
            .iter()
            .fold(1_u128, |acc, v| acc.saturating_mul(v.size()))
    }

    fn witness(&self) -> Assignment {
        let mut out: Assignment = self
            .vars
            .iter()
            .zip(&self.values)
            .map(|(var, &value)| (var.name.clone(), value))
            .collect();
        for var in &self.free {
            out.insert(var.name.clone(), var.min);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
