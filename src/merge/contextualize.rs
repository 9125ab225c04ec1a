//! Contextualization: guard a region's ordinary constraints with the
//! region's indicator so that they only apply to that region.

use regionmerge_oracle::{Condition, Constraint, Domain, FeatureName, Guard};
use tracing::instrument;

use crate::error::MergeError;
use crate::merge::types::Indicator;
use crate::model::Model;

/// Guard every ordinary constraint of `model` with `indicator`.
///
/// Structural and custom constraints are left alone, as are constraints
/// already guarded by this region's indicator, so running this twice changes
/// nothing the second time. A negated constraint, or one guarded by some
/// other feature, is folded into a plain condition before the region guard
/// is attached (see [`Constraint::contextualized`]). The indicator features
/// are declared in the returned model.
///
/// With [`Indicator::FeatureTree`], two custom `[1..1]` groups attach the
/// region root below the model root and the region feature below the region
/// root.
///
/// # Errors
/// - [`MergeError::IndicatorOutOfDomain`] if the integer value is outside
///   the indicator domain.
/// - [`MergeError::IndicatorClash`] if an indicator name is already a
///   feature with a different domain.
/// - [`MergeError::MissingRoot`] for the feature-tree strategy on a model
///   without a root.
#[instrument(skip_all, fields(region = %model.region))]
pub fn contextualize(mut model: Model, indicator: &Indicator) -> Result<Model, MergeError> {
    let guard = match indicator {
        Indicator::Integer {
            feature,
            domain,
            value,
        } => {
            if !domain.contains(*value) {
                return Err(MergeError::IndicatorOutOfDomain {
                    region: model.region.clone(),
                    value: *value,
                    domain: *domain,
                });
            }
            declare(&mut model, feature, *domain)?;
            Guard::new(feature.clone(), *value)
        }
        Indicator::FeatureTree { region_root } => {
            let root = model.root.clone().ok_or_else(|| MergeError::MissingRoot {
                region: model.region.clone(),
            })?;
            let region_feature = Indicator::region_feature(region_root, &model.region)?;
            declare(&mut model, region_root, Domain::Bool)?;
            declare(&mut model, &region_feature, Domain::Bool)?;
            for group in [
                Constraint::custom(Condition::mandatory(root, vec![region_root.clone()])),
                Constraint::custom(Condition::mandatory(
                    region_root.clone(),
                    vec![region_feature.clone()],
                )),
            ] {
                if !model.constraints.contains(&group) {
                    model.constraints.push(group);
                }
            }
            Guard::new(region_feature, 1)
        }
    };

    let mut guarded = 0usize;
    for constraint in &mut model.constraints {
        if !constraint.is_mergeable() {
            continue;
        }
        let scoped = constraint.contextualized(guard.clone());
        if scoped != *constraint {
            *constraint = scoped;
            guarded += 1;
        }
    }
    tracing::debug!(guarded, guard = %guard, "region contextualized");
    Ok(model)
}

/// Declare an indicator feature, tolerating an identical earlier declaration.
fn declare(model: &mut Model, feature: &FeatureName, domain: Domain) -> Result<(), MergeError> {
    match model.features.get(feature) {
        Some(existing) if *existing != domain => Err(MergeError::IndicatorClash {
            region: model.region.clone(),
            feature: feature.clone(),
        }),
        Some(_) => Ok(()),
        None => {
            model.features.insert(feature.clone(), domain);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
