//! Error types for the aggregation engine

use thiserror::Error;

/// Errors raised by the aggregation core
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AggregationError {
    /// Requested cluster count is zero or exceeds the number of leaf regions
    #[error("invalid cluster count {requested}: must be between 1 and {regions}")]
    InvalidClusterCount { requested: usize, regions: usize },

    /// A region has no centroid but the selected distance needs one
    #[error("region `{0}` has no centroid coordinate")]
    MissingCentroid(String),

    #[error("unknown aggregation strategy `{0}` (expected hierarchical, kmeans or spectral)")]
    UnknownStrategy(String),

    #[error("unknown linkage `{0}` (expected single, complete, average or centroid)")]
    UnknownLinkage(String),

    /// Feature weights must be finite and nonnegative
    #[error("invalid weight {value} for feature category `{category}`")]
    InvalidWeight { category: String, value: f64 },

    /// A NaN or infinite value reached a distance computation
    #[error("non-finite distance between regions `{a}` and `{b}`")]
    NonFiniteDistance { a: String, b: String },

    /// A NaN or infinite value in a region's assembled features
    #[error("non-finite feature value for region `{0}`")]
    NonFiniteFeature(String),

    #[error("unknown region `{0}`")]
    UnknownRegion(String),

    #[error("duplicate region `{0}`")]
    DuplicateRegion(String),

    /// The level lies in range but was not part of the requested cluster counts
    #[error("level k={0} was not computed")]
    LevelNotComputed(usize),

    #[error("cluster label separator must not be empty")]
    EmptySeparator,
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, AggregationError>;
