//! Region identifiers.
//!
//! A [`RegionId`] names the origin of a set of constraints: one id per source
//! model, plus the reserved ids the pipeline uses for its own working models
//! (`union`, `merged`, `testing`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// ---------------------------------------------------------------------------
// RegionId
// ---------------------------------------------------------------------------

/// A validated region identifier.
///
/// Region names must be lowercase alphanumeric with hyphens, 1–64 characters.
/// Examples: `eu`, `north-america`, `market-2`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId(String);

impl RegionId {
    /// The maximum length of a region name.
    pub const MAX_LEN: usize = 64;

    /// Ids the pipeline reserves for its own working models.
    pub const RESERVED: [&'static str; 3] = ["union", "merged", "testing"];

    /// Create a new `RegionId` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the name is empty, too long, or contains invalid characters.
    pub fn new(s: &str) -> Result<Self, ModelError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Create a user-facing region id, additionally rejecting reserved ids.
    ///
    /// # Errors
    /// Returns an error if the name is invalid or reserved.
    pub fn user(s: &str) -> Result<Self, ModelError> {
        let id = Self::new(s)?;
        if id.is_reserved() {
            return Err(ModelError::InvalidRegion {
                value: s.to_owned(),
                reason: format!(
                    "'{s}' is reserved for the merger's working models ({})",
                    Self::RESERVED.join(", ")
                ),
            });
        }
        Ok(id)
    }

    /// The id of a freshly built union model.
    #[must_use]
    pub fn union() -> Self {
        Self("union".to_owned())
    }

    /// The id of the resolver/minimizer output.
    #[must_use]
    pub fn merged() -> Self {
        Self("merged".to_owned())
    }

    /// The id of scratch models built for tests and verification.
    #[must_use]
    pub fn testing() -> Self {
        Self("testing".to_owned())
    }

    /// Returns `true` for one of the pipeline's reserved ids.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        Self::RESERVED.contains(&self.0.as_str())
    }

    /// Return the region name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ModelError> {
        let fail = |reason: String| {
            Err(ModelError::InvalidRegion {
                value: s.to_owned(),
                reason,
            })
        };
        if s.is_empty() {
            return fail("region name must not be empty".to_owned());
        }
        if s.len() > Self::MAX_LEN {
            return fail(format!(
                "region name must be at most {} characters, got {}",
                Self::MAX_LEN,
                s.len()
            ));
        }
        if s.starts_with('-') || s.ends_with('-') {
            return fail("region name must not start or end with a hyphen".to_owned());
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return fail(
                "region name must contain only lowercase letters (a-z), digits (0-9), and hyphens (-)"
                    .to_owned(),
            );
        }
        Ok(())
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RegionId {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RegionId {
    type Error = ModelError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<RegionId> for String {
    fn from(id: RegionId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_region_ids() {
        for name in ["eu", "north-america", "market-2", "a"] {
            assert!(RegionId::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn invalid_region_ids() {
        for name in ["", "EU", "-eu", "eu-", "eu_west", "e u"] {
            assert!(RegionId::new(name).is_err(), "{name:?} should be invalid");
        }
        assert!(RegionId::new(&"a".repeat(65)).is_err());
    }

    #[test]
    fn reserved_ids_rejected_for_users() {
        assert!(RegionId::union().is_reserved());
        assert!(RegionId::merged().is_reserved());
        assert!(RegionId::testing().is_reserved());
        assert!(RegionId::user("merged").is_err());
        assert!(RegionId::user("eu").is_ok());
    }

    #[test]
    fn serde_round_trip_validates() {
        let id: RegionId = serde_json::from_str("\"eu\"").unwrap();
        assert_eq!(id.as_str(), "eu");
        assert!(serde_json::from_str::<RegionId>("\"EU\"").is_err());
    }
}
