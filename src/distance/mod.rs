//! Composite dissimilarity between regions

use ndarray::Array2;
use rayon::prelude::*;

use crate::data::preprocessing::euclidean;
use crate::data::FeatureMatrix;
use crate::error::{AggregationError, Result};

/// Dissimilarity combining feature distance and connection strength.
///
/// `distance(a, b) = |p1(a) - p1(b)| + connectivity_weight * structural(a, b)`
/// where the structural term is the capped reciprocal of the mean of the two
/// directed connection strengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceMetric {
    cap: f64,
    connectivity_weight: f64,
}

impl DistanceMetric {
    pub fn new(cap: f64, connectivity_weight: f64) -> Self {
        Self {
            cap,
            connectivity_weight,
        }
    }

    pub fn cap(&self) -> f64 {
        self.cap
    }

    /// Scale applied to the structural term
    pub fn connectivity_weight(&self) -> f64 {
        self.connectivity_weight
    }

    /// Reciprocal of a connection strength, bounded by the cap.
    /// Zero, negative or non-finite strengths map to the cap.
    pub fn inverse_strength(&self, strength: f64) -> f64 {
        if strength.is_finite() && strength > 0.0 {
            (1.0 / strength).min(self.cap)
        } else {
            self.cap
        }
    }

    /// Structural term over part-2; 0 on the diagonal
    pub fn structural(&self, features: &FeatureMatrix, a: usize, b: usize) -> f64 {
        if a == b {
            return 0.0;
        }
        let mean = 0.5 * (features.connection(a, b) + features.connection(b, a));
        self.inverse_strength(mean)
    }

    pub fn feature_distance(&self, features: &FeatureMatrix, a: usize, b: usize) -> f64 {
        euclidean(features.part1.row(a), features.part1.row(b))
    }

    pub fn distance(&self, features: &FeatureMatrix, a: usize, b: usize) -> f64 {
        if a == b {
            return 0.0;
        }
        let mut d = self.feature_distance(features, a, b);
        if features.part2.is_some() {
            d += self.connectivity_weight * self.structural(features, a, b);
        }
        d
    }
}

/// Dense symmetric matrix of pairwise region distances
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    values: Array2<f64>,
}

impl DistanceMatrix {
    /// Compute every pair, rows in parallel.
    ///
    /// Fails with `NonFiniteDistance` if any pair evaluates to NaN or infinity.
    pub fn build(features: &FeatureMatrix, metric: &DistanceMetric, region_ids: &[String]) -> Result<Self> {
        let n = features.region_count();
        log::info!("Computing {}x{} distance matrix", n, n);

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| if j < i { 0.0 } else { metric.distance(features, i, j) }).collect())
            .collect();

        let mut values = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, d) in row.into_iter().enumerate().skip(i + 1) {
                if !d.is_finite() {
                    return Err(AggregationError::NonFiniteDistance {
                        a: region_ids[i].clone(),
                        b: region_ids[j].clone(),
                    });
                }
                values[[i, j]] = d;
                values[[j, i]] = d;
            }
        }

        Ok(Self { values })
    }

    /// Wrap a precomputed square matrix
    pub fn from_array(values: Array2<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, a: usize, b: usize) -> f64 {
        self.values[[a, b]]
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.values
    }

    /// Upper-triangle entries in row-major order
    pub fn condensed(&self) -> Vec<f64> {
        let n = self.len();
        (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .map(|(i, j)| self.values[[i, j]])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("r{}", i)).collect()
    }

    #[test]
    fn feature_only_distance_is_euclidean() {
        let features = FeatureMatrix {
            part1: array![[0.0, 0.0], [3.0, 4.0]],
            part2: None,
        };
        let metric = DistanceMetric::new(100.0, 1.0);
        assert_eq!(metric.distance(&features, 0, 1), 5.0);
        assert_eq!(metric.distance(&features, 1, 0), 5.0);
        assert_eq!(metric.distance(&features, 1, 1), 0.0);
    }

    #[test]
    fn structural_term_uses_mean_reciprocal() {
        let features = FeatureMatrix {
            part1: array![[0.0], [0.0], [0.0]],
            part2: Some(array![[0.0, 1.0, 0.0], [3.0, 0.0, 0.0], [0.0, 0.0, 0.0]]),
        };
        let metric = DistanceMetric::new(50.0, 2.0);
        assert_eq!(metric.structural(&features, 0, 1), 0.5);
        assert_eq!(metric.distance(&features, 0, 1), 1.0);
        assert_eq!(metric.distance(&features, 1, 0), 1.0);
    }

    #[test]
    fn isolated_region_hits_the_cap() {
        let features = FeatureMatrix {
            part1: array![[0.0], [1.0], [2.0]],
            part2: Some(array![[0.0, 2.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 0.0]]),
        };
        let metric = DistanceMetric::new(1_000.0, 1.0);
        for other in 0..2 {
            let term = metric.structural(&features, 2, other);
            assert_eq!(term, metric.cap());
            assert!(term.is_finite());
        }
        assert_eq!(metric.structural(&features, 2, 2), 0.0);
    }

    #[test]
    fn zero_connectivity_weight_drops_structural_term() {
        let features = FeatureMatrix {
            part1: array![[0.0], [3.0]],
            part2: Some(array![[0.0, 0.0], [0.0, 0.0]]),
        };
        let metric = DistanceMetric::new(50.0, 0.0);
        assert_eq!(metric.connectivity_weight(), 0.0);
        assert_eq!(metric.structural(&features, 0, 1), 50.0);
        assert_eq!(metric.distance(&features, 0, 1), 3.0);
    }

    #[test]
    fn inverse_strength_is_bounded() {
        let metric = DistanceMetric::new(10.0, 1.0);
        assert_eq!(metric.inverse_strength(0.0), 10.0);
        assert_eq!(metric.inverse_strength(-1.0), 10.0);
        assert_eq!(metric.inverse_strength(f64::NAN), 10.0);
        assert_eq!(metric.inverse_strength(1e-9), 10.0);
        assert_eq!(metric.inverse_strength(4.0), 0.25);
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let features = FeatureMatrix {
            part1: array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            part2: None,
        };
        let matrix = DistanceMatrix::build(&features, &DistanceMetric::new(1.0, 1.0), &ids(3)).unwrap();
        for i in 0..3 {
            assert_eq!(matrix.get(i, i), 0.0);
            for j in 0..3 {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
            }
        }
        assert_eq!(matrix.condensed(), vec![1.0, 1.0, 2f64.sqrt()]);
    }

    #[test]
    fn non_finite_features_are_reported() {
        let features = FeatureMatrix {
            part1: array![[0.0], [f64::INFINITY]],
            part2: None,
        };
        let err = DistanceMatrix::build(&features, &DistanceMetric::new(1.0, 1.0), &ids(2)).unwrap_err();
        assert_eq!(
            err,
            AggregationError::NonFiniteDistance { a: "r0".into(), b: "r1".into() }
        );
    }
}
