//! Core types shared by the merge stages.
//!
//! Defines how regions are told apart in the merged model ([`Indicator`],
//! [`IndicatorStrategy`]), the cooperative [`CancelFlag`], and the options
//! that drive a full pipeline run ([`MergeOptions`]).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use regionmerge_oracle::{Budget, Domain, FeatureName};

use crate::error::{MergeError, ModelError};
use crate::model::types::RegionId;

// ---------------------------------------------------------------------------
// IndicatorStrategy
// ---------------------------------------------------------------------------

/// How the merged model distinguishes regions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndicatorStrategy {
    /// One integer feature; region `i` (in input order) is `feature = i`.
    Integer {
        /// Name of the indicator feature.
        feature: FeatureName,
    },
    /// Boolean features hung below the model root: a shared `region_root`
    /// and one `<region_root>_<region>` child per region.
    FeatureTree {
        /// Name of the shared region root feature.
        region_root: FeatureName,
    },
}

impl IndicatorStrategy {
    /// The integer strategy with the conventional indicator name `region`.
    ///
    /// # Errors
    /// Returns an error if `feature` is not a valid feature name.
    pub fn integer(feature: &str) -> Result<Self, ModelError> {
        Ok(Self::Integer {
            feature: FeatureName::new(feature)?,
        })
    }

    /// The feature-tree strategy rooted at `region_root`.
    ///
    /// # Errors
    /// Returns an error if `region_root` is not a valid feature name.
    pub fn feature_tree(region_root: &str) -> Result<Self, ModelError> {
        Ok(Self::FeatureTree {
            region_root: FeatureName::new(region_root)?,
        })
    }

    /// Short name, for reports and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Integer { .. } => "integer",
            Self::FeatureTree { .. } => "feature-tree",
        }
    }

    /// The indicator assigned to the region at `position` of `count` inputs.
    ///
    /// # Errors
    /// Returns [`MergeError::NoModels`] when `count` is zero.
    pub fn indicator(&self, position: usize, count: usize) -> Result<Indicator, MergeError> {
        let last = count.checked_sub(1).ok_or(MergeError::NoModels)?;
        Ok(match self {
            Self::Integer { feature } => Indicator::Integer {
                feature: feature.clone(),
                domain: Domain::Int {
                    min: 0,
                    max: i64::try_from(last).unwrap_or(i64::MAX),
                },
                value: i64::try_from(position).unwrap_or(i64::MAX),
            },
            Self::FeatureTree { region_root } => Indicator::FeatureTree {
                region_root: region_root.clone(),
            },
        })
    }
}

impl fmt::Display for IndicatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Indicator
// ---------------------------------------------------------------------------

/// The concrete indicator used to contextualize one region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Indicator {
    /// Guard constraints with `feature = value`; `feature` ranges over `domain`.
    Integer {
        /// Indicator feature.
        feature: FeatureName,
        /// Indicator domain, shared by every region of the merge.
        domain: Domain,
        /// This region's value.
        value: i64,
    },
    /// Guard constraints with `<region_root>_<region> = 1`.
    FeatureTree {
        /// Shared region root feature.
        region_root: FeatureName,
    },
}

impl Indicator {
    /// Integer indicator `feature = value` over `domain`.
    #[must_use]
    pub const fn integer(feature: FeatureName, domain: Domain, value: i64) -> Self {
        Self::Integer {
            feature,
            domain,
            value,
        }
    }

    /// The region-specific feature of the feature-tree strategy.
    ///
    /// # Errors
    /// Returns an error if the combined name is not a valid feature name
    /// (e.g. it exceeds the length limit).
    pub fn region_feature(
        region_root: &FeatureName,
        region: &RegionId,
    ) -> Result<FeatureName, ModelError> {
        Ok(FeatureName::new(&format!("{region_root}_{region}"))?)
    }

    /// Every feature this indicator adds to `region`'s model.
    ///
    /// # Errors
    /// See [`Indicator::region_feature`].
    pub fn features(&self, region: &RegionId) -> Result<Vec<FeatureName>, ModelError> {
        match self {
            Self::Integer { feature, .. } => Ok(vec![feature.clone()]),
            Self::FeatureTree { region_root } => Ok(vec![
                region_root.clone(),
                Self::region_feature(region_root, region)?,
            ]),
        }
    }

    /// The feature and value that select `region` in the merged model.
    ///
    /// # Errors
    /// See [`Indicator::region_feature`].
    pub fn selector(&self, region: &RegionId) -> Result<(FeatureName, i64), ModelError> {
        match self {
            Self::Integer { feature, value, .. } => Ok((feature.clone(), *value)),
            Self::FeatureTree { region_root } => {
                Ok((Self::region_feature(region_root, region)?, 1))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CancelFlag
// ---------------------------------------------------------------------------

/// A shareable cancellation signal, checked by the resolver and the
/// minimizer between constraints.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that is not yet cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Stages finish the constraint in flight and stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once [`CancelFlag::cancel`] has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Returns `true` if `cancel` is set and has fired.
pub(crate) fn cancelled(cancel: Option<&CancelFlag>) -> bool {
    cancel.is_some_and(CancelFlag::is_cancelled)
}

// ---------------------------------------------------------------------------
// MergeOptions
// ---------------------------------------------------------------------------

/// Settings for one run of the merge pipeline.
#[derive(Clone, Debug)]
pub struct MergeOptions {
    /// How regions are distinguished.
    pub strategy: IndicatorStrategy,
    /// Budget for every oracle call.
    pub budget: Budget,
    /// Reject unsatisfiable inputs before merging.
    pub check_base: bool,
    /// Run the resolver. When off, the union is passed on unchanged.
    pub resolve: bool,
    /// Run the minimizer.
    pub minimize: bool,
    /// Repeat minimizer passes until nothing is removed.
    pub fixed_point: bool,
    /// Upper bound on minimizer passes when `fixed_point` is set.
    pub max_passes: usize,
    /// Compare solution counts of the result against the inputs.
    pub verify: bool,
    /// Cooperative cancellation.
    pub cancel: Option<CancelFlag>,
}

impl MergeOptions {
    /// Default options for `strategy`.
    #[must_use]
    pub const fn new(strategy: IndicatorStrategy) -> Self {
        Self {
            strategy,
            budget: Budget::unlimited(),
            check_base: true,
            resolve: true,
            minimize: true,
            fixed_point: false,
            max_passes: 8,
            verify: false,
            cancel: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
