//! Shared test helpers for regionmerge integration tests.
//!
//! Counts go through the enumeration oracle with no budget, so they are
//! always exact.

#![allow(dead_code)]

use regionmerge::model::{Model, RegionId};
use regionmerge::oracle::{
    CmpOp, Condition, Constraint, Domain, EnumerationOracle, FeatureName, Oracle,
};

pub fn name(s: &str) -> FeatureName {
    FeatureName::new(s).expect("valid feature name")
}

/// Exact solution count of `model`.
pub fn count(model: &Model) -> u128 {
    count_where(model, &[])
}

/// Exact solution count of `model` with some features fixed.
pub fn count_where(model: &Model, fixed: &[(&str, i64)]) -> u128 {
    let assumptions: Vec<(FeatureName, i64)> =
        fixed.iter().map(|(f, v)| (name(f), *v)).collect();
    EnumerationOracle::new()
        .count(&model.query().with_assumptions(&assumptions))
        .expect("enumeration never fails")
        .exact()
        .expect("unlimited budget never times out")
}

/// Two regions over `x ∈ [0..3]`, `y ∈ {0,1}` sharing `x = 0 => y = 1`.
/// Region `a` forbids `x = 3`, region `b` forbids `x = 2`.
pub fn two_region_scenario() -> (Model, Model) {
    let region = |id: &str, ne: i64| {
        Model::new(RegionId::new(id).expect("valid region"))
            .with_feature(name("x"), Domain::range(0, 3).expect("non-empty"))
            .with_feature(name("y"), Domain::range(0, 1).expect("non-empty"))
            .with_constraint(Constraint::new(Condition::compare(name("x"), CmpOp::Ne, ne)))
            .with_constraint(Constraint::new(Condition::implies(
                Condition::compare(name("x"), CmpOp::Eq, 0),
                Condition::compare(name("y"), CmpOp::Eq, 1),
            )))
    };
    (region("a", 3), region("b", 2))
}
