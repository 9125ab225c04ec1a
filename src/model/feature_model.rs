//! The [`Model`] type: one region's features and constraints.

use std::collections::BTreeMap;

use regionmerge_oracle::{Constraint, ConstraintKind, Domain, FeatureName, Query};
use serde::Serialize;

use crate::error::ModelError;
use crate::model::types::RegionId;

/// An ordered collection of constraints over declared features, tagged with
/// the region it belongs to.
///
/// Invariant (checked by [`Model::validate`]): every feature mentioned by a
/// constraint, guard indicators included, is declared in `features`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Model {
    /// Origin of the constraints.
    pub region: RegionId,
    /// Root of the feature tree, for feature-model style inputs.
    pub root: Option<FeatureName>,
    /// Declared features and their domains.
    pub features: BTreeMap<FeatureName, Domain>,
    /// Constraints in source order.
    pub constraints: Vec<Constraint>,
}

/// Constraint counts by kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    /// Ordinary (mergeable) constraints.
    pub ordinary: usize,
    /// Structural feature-tree constraints.
    pub structural: usize,
    /// Constraints injected by the merger.
    pub custom: usize,
    /// Constraints currently carrying a contextual guard.
    pub contextualized: usize,
}

impl Model {
    /// An empty model for `region`.
    #[must_use]
    pub const fn new(region: RegionId) -> Self {
        Self {
            region,
            root: None,
            features: BTreeMap::new(),
            constraints: Vec::new(),
        }
    }

    /// Set the feature-tree root.
    #[must_use]
    pub fn with_root(mut self, root: FeatureName) -> Self {
        self.root = Some(root);
        self
    }

    /// Declare a feature.
    #[must_use]
    pub fn with_feature(mut self, name: FeatureName, domain: Domain) -> Self {
        self.features.insert(name, domain);
        self
    }

    /// Append a constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Re-tag the model with another region id.
    #[must_use]
    pub fn retagged(mut self, region: RegionId) -> Self {
        self.region = region;
        self
    }

    /// Number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Returns `true` if the model has no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Count constraints by kind.
    #[must_use]
    pub fn kind_counts(&self) -> KindCounts {
        let mut counts = KindCounts::default();
        for c in &self.constraints {
            match c.kind {
                ConstraintKind::Ordinary => counts.ordinary += 1,
                ConstraintKind::Structural => counts.structural += 1,
                ConstraintKind::Custom => counts.custom += 1,
            }
            if c.is_contextualized() {
                counts.contextualized += 1;
            }
        }
        counts
    }

    /// An oracle query over the whole model.
    #[must_use]
    pub fn query(&self) -> Query<'_> {
        Query::new(&self.constraints, &self.features)
    }

    /// Check the reference invariant: every mentioned feature is declared,
    /// the root (if any) is declared, and no declared domain is empty.
    ///
    /// # Errors
    /// Returns the first violation found, naming the offending constraint and
    /// feature.
    pub fn validate(&self) -> Result<(), ModelError> {
        for (name, domain) in &self.features {
            if domain.is_empty() {
                let (min, max) = domain.bounds();
                return Err(ModelError::EmptyDomain {
                    feature: name.clone(),
                    min,
                    max,
                });
            }
        }
        if let Some(root) = &self.root
            && !self.features.contains_key(root)
        {
            return Err(ModelError::UnknownRoot {
                region: self.region.clone(),
                root: root.clone(),
            });
        }
        for (index, constraint) in self.constraints.iter().enumerate() {
            if let Some(missing) = constraint
                .features()
                .into_iter()
                .find(|f| !self.features.contains_key(*f))
            {
                return Err(ModelError::UnknownFeature {
                    region: self.region.clone(),
                    index,
                    constraint: constraint.to_string(),
                    feature: missing.clone(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
