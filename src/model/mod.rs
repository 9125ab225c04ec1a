//! Region model data types.

pub mod feature_model;
pub mod types;

pub use feature_model::{KindCounts, Model};
pub use types::RegionId;
