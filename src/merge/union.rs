//! Union: concatenate contextualized region models into one model.

use regionmerge_oracle::{Condition, Constraint, ConstraintKind, FeatureName};
use tracing::instrument;

use crate::error::MergeError;
use crate::model::{Model, RegionId};

/// Combine two models into one tagged `region`.
///
/// Constraints of `a` come first, then those of `b`; nothing is deduplicated
/// and no satisfiability check is made. Features are merged by name.
///
/// Custom `[1..1]` groups with the same parent (the membership groups added
/// by the feature-tree indicator) are folded into a single group over both
/// sets of children, kept at the position of the first.
///
/// # Errors
/// - [`MergeError::DomainMismatch`] if a feature has different domains.
/// - [`MergeError::RootMismatch`] if both models have different roots.
#[instrument(skip_all, fields(left = %a.region, right = %b.region))]
pub fn union(a: Model, b: Model, region: RegionId) -> Result<Model, MergeError> {
    let root = match (a.root, b.root) {
        (Some(left), Some(right)) if left != right => {
            return Err(MergeError::RootMismatch { left, right });
        }
        (left, right) => left.or(right),
    };

    let mut features = a.features;
    for (name, domain) in b.features {
        match features.get(&name) {
            Some(existing) if *existing != domain => {
                return Err(MergeError::DomainMismatch {
                    feature: name,
                    left: *existing,
                    right: domain,
                });
            }
            Some(_) => {}
            None => {
                features.insert(name, domain);
            }
        }
    }

    let mut constraints = a.constraints;
    let mut folded = 0usize;
    for constraint in b.constraints {
        if fold_membership(&mut constraints, &constraint) {
            folded += 1;
        } else {
            constraints.push(constraint);
        }
    }

    tracing::debug!(constraints = constraints.len(), folded, "models united");
    Ok(Model {
        region,
        root,
        features,
        constraints,
    })
}

/// Left fold of [`union`] over `models`.
///
/// # Errors
/// [`MergeError::NoModels`] for an empty input, otherwise as [`union`].
pub fn union_all(models: Vec<Model>, region: RegionId) -> Result<Model, MergeError> {
    let mut iter = models.into_iter();
    let first = iter.next().ok_or(MergeError::NoModels)?;
    let mut acc = first.retagged(region.clone());
    for model in iter {
        acc = union(acc, model, region.clone())?;
    }
    Ok(acc)
}

/// Try to merge `incoming` into an existing custom `[1..1]` group with the
/// same parent. Returns `true` if it was absorbed.
fn fold_membership(constraints: &mut [Constraint], incoming: &Constraint) -> bool {
    let Some((parent, children)) = membership_group(incoming) else {
        return false;
    };
    let Some(target) = constraints
        .iter_mut()
        .find(|c| membership_group(c).is_some_and(|(p, _)| p == parent))
    else {
        return false;
    };
    if let Condition::Group {
        children: existing, ..
    } = &mut target.condition
    {
        for child in children {
            if !existing.contains(child) {
                existing.push(child.clone());
            }
        }
    }
    true
}

fn membership_group(c: &Constraint) -> Option<(&FeatureName, &[FeatureName])> {
    match &c.condition {
        Condition::Group {
            parent,
            children,
            min: 1,
            max: 1,
        } if c.kind == ConstraintKind::Custom && c.context.is_none() && !c.negated => {
            Some((parent, children.as_slice()))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use regionmerge_oracle::{CmpOp, Domain};

    use super::*;

    fn name(s: &str) -> FeatureName {
        FeatureName::new(s).unwrap()
    }

    fn model(region: &str) -> Model {
        Model::new(RegionId::new(region).unwrap())
            .with_feature(name("x"), Domain::range(0, 3).unwrap())
            .with_constraint(Constraint::new(Condition::compare(name("x"), CmpOp::Ne, 3)))
    }

    #[test]
    fn concatenates_constraints_in_order() {
        let a = model("a");
        let b = model("b")
            .with_feature(name("y"), Domain::Bool)
            .with_constraint(Constraint::new(Condition::Selected(name("y"))));
        let u = union(a, b, RegionId::union()).unwrap();
        assert_eq!(u.region, RegionId::union());
        assert_eq!(u.len(), 3);
        assert_eq!(u.constraints[0], u.constraints[1]);
        assert_eq!(u.features.len(), 2);
    }

    #[test]
    fn rejects_domain_mismatch() {
        let a = model("a");
        let b = Model::new(RegionId::new("b").unwrap()).with_feature(name("x"), Domain::Bool);
        assert!(matches!(
            union(a, b, RegionId::union()),
            Err(MergeError::DomainMismatch { .. })
        ));
    }

    #[test]
    fn rejects_root_mismatch_and_keeps_single_root() {
        let a = model("a").with_feature(name("Car"), Domain::Bool).with_root(name("Car"));
        let b = model("b");
        let u = union(a.clone(), b, RegionId::union()).unwrap();
        assert_eq!(u.root, Some(name("Car")));

        let c = model("c").with_feature(name("Bike"), Domain::Bool).with_root(name("Bike"));
        assert!(matches!(
            union(a, c, RegionId::union()),
            Err(MergeError::RootMismatch { .. })
        ));
    }

    #[test]
    fn folds_membership_groups() {
        let group = |child: &str| {
            Constraint::custom(Condition::mandatory(name("Region"), vec![name(child)]))
        };
        let shared = Constraint::custom(Condition::mandatory(name("Car"), vec![name("Region")]));
        let a = model("a").with_constraint(shared.clone()).with_constraint(group("Region_a"));
        let b = model("b").with_constraint(shared).with_constraint(group("Region_b"));
        let u = union(a, b, RegionId::union()).unwrap();
        assert_eq!(u.len(), 4);
        assert_eq!(
            u.constraints[2].condition,
            Condition::mandatory(name("Region"), vec![name("Region_a"), name("Region_b")])
        );
    }

    #[test]
    fn structural_groups_are_not_folded() {
        let g = Constraint::structural(Condition::mandatory(name("x"), vec![name("x")]));
        let a = model("a").with_constraint(g.clone());
        let b = model("b").with_constraint(g);
        assert_eq!(union(a, b, RegionId::union()).unwrap().len(), 4);
    }

    #[test]
    fn union_all_folds_left() {
        let u = union_all(vec![model("a"), model("b"), model("c")], RegionId::union()).unwrap();
        assert_eq!(u.len(), 3);
        assert!(matches!(
            union_all(Vec::new(), RegionId::union()),
            Err(MergeError::NoModels)
        ));
    }
}
