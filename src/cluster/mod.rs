//! Cluster analysis module

pub mod disjoint;
pub mod grouping;
pub mod hierarchical;
pub mod kmeans;
pub mod metrics;
pub mod spectral;

pub use hierarchical::{HierarchicalAggregator, MergeNode, MergeTree};
pub use kmeans::{KMeansResult, KMeansSettings};
