//! Input dataset: leaf regions and their optional feature tables

pub mod builder;
pub mod features;
pub mod json;
pub mod preprocessing;

use std::collections::{BTreeMap, HashMap};

use ndarray::Array2;

use crate::error::{AggregationError, Result};

pub use builder::DatasetBuilder;
pub use features::{FeatureExtractor, FeatureMatrix};

/// Immutable collection of leaf regions and their feature tables.
///
/// All tables are indexed by region position in `region_ids`. Tables are kept
/// in `BTreeMap`s so that feature concatenation follows table-name order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub(crate) region_ids: Vec<String>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) centroids: Vec<Option<[f64; 2]>>,
    pub(crate) time_series: BTreeMap<String, Vec<Vec<f64>>>,
    pub(crate) attributes: BTreeMap<String, Vec<f64>>,
    pub(crate) connectivity: BTreeMap<String, Array2<f64>>,
}

impl Dataset {
    /// Number of leaf regions
    pub fn len(&self) -> usize {
        self.region_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.region_ids.is_empty()
    }

    /// Leaf region identifiers in input order
    pub fn region_ids(&self) -> &[String] {
        &self.region_ids
    }

    /// Position of a region in input order
    pub fn position(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| AggregationError::UnknownRegion(id.to_string()))
    }

    pub fn centroid(&self, region: usize) -> Option<[f64; 2]> {
        self.centroids.get(region).copied().flatten()
    }

    /// True if at least one region carries a centroid
    pub fn has_centroids(&self) -> bool {
        self.centroids.iter().any(Option::is_some)
    }

    /// Centroid coordinates as an `N x 2` matrix; every region must have one
    pub fn centroid_matrix(&self) -> Result<Array2<f64>> {
        let mut matrix = Array2::zeros((self.len(), 2));
        for (i, centroid) in self.centroids.iter().enumerate() {
            let [x, y] = centroid
                .ok_or_else(|| AggregationError::MissingCentroid(self.region_ids[i].clone()))?;
            matrix[[i, 0]] = x;
            matrix[[i, 1]] = y;
        }
        Ok(matrix)
    }

    pub fn time_series(&self) -> &BTreeMap<String, Vec<Vec<f64>>> {
        &self.time_series
    }

    pub fn attributes(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.attributes
    }

    /// Dense directed connectivity tables, `[from, to]`
    pub fn connectivity(&self) -> &BTreeMap<String, Array2<f64>> {
        &self.connectivity
    }

    pub fn has_connectivity(&self) -> bool {
        !self.connectivity.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_matrix_requires_every_region() {
        let mut builder = DatasetBuilder::with_capacity(2);
        builder.add_region("north").unwrap();
        builder.add_region("south").unwrap();
        builder.set_centroid("north", 1.0, 2.0).unwrap();
        let dataset = builder.build();

        assert!(dataset.has_centroids());
        assert_eq!(
            dataset.centroid_matrix(),
            Err(AggregationError::MissingCentroid("south".into()))
        );
    }

    #[test]
    fn looks_up_positions() {
        let dataset = DatasetBuilder::from_centroids([("a", [0.0, 0.0]), ("b", [1.0, 0.0])])
            .unwrap()
            .build();
        assert_eq!(dataset.position("b"), Ok(1));
        assert_eq!(dataset.position("z"), Err(AggregationError::UnknownRegion("z".into())));
        assert_eq!(dataset.centroid(1), Some([1.0, 0.0]));
        assert!(!dataset.has_connectivity());
    }
}
