//! Core library functions for the region aggregator

pub mod aggregate;
pub mod cluster;
pub mod config;
pub mod data;
pub mod distance;
pub mod error;
pub mod hierarchy;
pub mod storage;
pub mod viz;

pub use aggregate::{aggregate, AggregationOutcome, Diagnostics};
pub use config::{AggregationConfig, AggregationStrategy, FeatureScaling, FeatureWeights, Linkage};
pub use data::{Dataset, DatasetBuilder};
pub use error::{AggregationError, Result};
pub use hierarchy::{AggregationHierarchy, AggregationLevel, Cluster};
