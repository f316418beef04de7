//! Per-region feature assembly

use ndarray::{Array2, Axis};

use crate::config::{FeatureScaling, FeatureWeights};
use crate::data::preprocessing::min_max_scale;
use crate::data::Dataset;
use crate::error::{AggregationError, Result};

/// Feature representation of every region.
///
/// `part1` holds one row per region: weighted centroid, flattened time series
/// and scalar attributes, in that order. `part2` is the combined directed
/// connectivity matrix, present only when the dataset has connectivity tables.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub part1: Array2<f64>,
    pub part2: Option<Array2<f64>>,
}

impl FeatureMatrix {
    pub fn region_count(&self) -> usize {
        self.part1.nrows()
    }

    /// Combined connectivity from `a` to `b`, 0 without connectivity data
    pub fn connection(&self, a: usize, b: usize) -> f64 {
        self.part2.as_ref().map_or(0.0, |m| m[[a, b]])
    }
}

/// Builds `FeatureMatrix` values from a dataset
pub struct FeatureExtractor<'a> {
    weights: &'a FeatureWeights,
    scaling: FeatureScaling,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(weights: &'a FeatureWeights, scaling: FeatureScaling) -> Self {
        Self { weights, scaling }
    }

    /// Concatenate whatever feature categories the dataset carries.
    ///
    /// Centroids are used if any region has one, in which case every region
    /// must. Absent categories are simply skipped.
    pub fn extract(&self, dataset: &Dataset) -> Result<FeatureMatrix> {
        let n = dataset.len();
        let mut blocks: Vec<Array2<f64>> = Vec::new();

        if dataset.has_centroids() {
            let mut centroids = dataset.centroid_matrix()?;
            self.rescale(&mut centroids);
            centroids *= self.weights.table_weight(self.weights.centroid, "centroid");
            blocks.push(centroids);
        }

        for (name, rows) in dataset.time_series() {
            let width = rows.first().map_or(0, Vec::len);
            let mut block = Array2::zeros((n, width));
            for (i, row) in rows.iter().enumerate() {
                for (j, &value) in row.iter().enumerate() {
                    block[[i, j]] = value;
                }
            }
            self.rescale(&mut block);
            block *= self.weights.table_weight(self.weights.time_series, name);
            blocks.push(block);
        }

        for (name, values) in dataset.attributes() {
            let mut block = Array2::zeros((n, 1));
            for (i, &value) in values.iter().enumerate() {
                block[[i, 0]] = value;
            }
            self.rescale(&mut block);
            block *= self.weights.table_weight(self.weights.attributes, name);
            blocks.push(block);
        }

        let width = blocks.iter().map(|b| b.ncols()).sum();
        let mut part1 = Array2::zeros((n, width));
        let mut offset = 0;
        for block in &blocks {
            let cols = block.ncols();
            part1
                .slice_mut(ndarray::s![.., offset..offset + cols])
                .assign(block);
            offset += cols;
        }

        let part2 = self.combine_connectivity(dataset);

        if let Some((i, _)) = part1
            .axis_iter(Axis(0))
            .enumerate()
            .find(|(_, row)| row.iter().any(|v| !v.is_finite()))
        {
            return Err(AggregationError::NonFiniteFeature(dataset.region_ids()[i].clone()));
        }

        log::debug!(
            "Extracted {} part-1 features per region from {} blocks (connectivity: {})",
            width,
            blocks.len(),
            part2.is_some()
        );

        Ok(FeatureMatrix { part1, part2 })
    }

    /// Weighted sum of the connectivity tables; the category weight is
    /// applied later to the structural distance term, not to the strengths.
    fn combine_connectivity(&self, dataset: &Dataset) -> Option<Array2<f64>> {
        if !dataset.has_connectivity() {
            return None;
        }

        let n = dataset.len();
        let mut combined = Array2::zeros((n, n));
        for (name, table) in dataset.connectivity() {
            let mut table = table.clone();
            self.rescale(&mut table);
            combined.scaled_add(self.weights.table_weight(1.0, name), &table);
        }
        combined.diag_mut().fill(0.0);
        Some(combined)
    }

    fn rescale(&self, block: &mut Array2<f64>) {
        match self.scaling {
            FeatureScaling::None => {}
            FeatureScaling::MinMax => min_max_scale(block.iter_mut()),
        }
    }
}
