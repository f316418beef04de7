//! Affinity-based graph partitioning.
//!
//! The affinity matrix adds a Gaussian kernel over part-1 feature distances
//! to a Gaussian kernel over inverted connection strengths. Partitions come
//! from the normalized spectral embedding of that graph, clustered with
//! k-means.

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array2;

use crate::cluster::kmeans::{kmeans, KMeansSettings};
use crate::data::FeatureMatrix;
use crate::distance::DistanceMetric;
use crate::error::{AggregationError, Result};

/// Gaussian (heat) kernel
fn gaussian(distance: f64, delta: f64) -> f64 {
    (-(distance * distance) / (2.0 * delta * delta)).exp()
}

/// Symmetric affinity matrix with zero self-affinity.
///
/// Missing or zero connectivity goes through the metric's cap before the
/// kernel, so it contributes (almost) nothing rather than an infinity. The
/// connectivity kernel is scaled by the metric's connectivity weight.
pub fn affinity_matrix(features: &FeatureMatrix, metric: &DistanceMetric, delta: f64) -> Array2<f64> {
    let n = features.region_count();
    let mut affinity = Array2::zeros((n, n));

    for i in 0..n {
        for j in i + 1..n {
            let mut value = gaussian(metric.feature_distance(features, i, j), delta);
            if features.part2.is_some() {
                let structural = gaussian(metric.structural(features, i, j), delta);
                value += metric.connectivity_weight() * structural;
            }
            affinity[[i, j]] = value;
            affinity[[j, i]] = value;
        }
    }

    affinity
}

/// Partition the graph described by `affinity` into `k` groups
pub fn spectral_labels(affinity: &Array2<f64>, k: usize, settings: &KMeansSettings) -> Result<Vec<usize>> {
    let n = affinity.nrows();
    if k == 0 || k > n {
        return Err(AggregationError::InvalidClusterCount {
            requested: k,
            regions: n,
        });
    }
    if k == n {
        return Ok((0..n).collect());
    }
    if k == 1 {
        return Ok(vec![0; n]);
    }

    let embedding = spectral_embedding(affinity, k);
    Ok(kmeans(embedding.view(), k, settings)?.labels)
}

/// Rows of the top-`k` eigenvectors of `D^-1/2 A D^-1/2`, each normalized
/// to unit length.
pub fn spectral_embedding(affinity: &Array2<f64>, k: usize) -> Array2<f64> {
    let n = affinity.nrows();
    let inv_sqrt_degree: Vec<f64> = affinity
        .rows()
        .into_iter()
        .map(|row| {
            let degree: f64 = row.sum();
            if degree > 0.0 {
                1.0 / degree.sqrt()
            } else {
                0.0
            }
        })
        .collect();

    let normalized = DMatrix::from_fn(n, n, |i, j| {
        affinity[[i, j]] * inv_sqrt_degree[i] * inv_sqrt_degree[j]
    });
    let eigen = SymmetricEigen::new(normalized);

    // largest eigenvalues first, index breaks ties
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .total_cmp(&eigen.eigenvalues[a])
            .then(a.cmp(&b))
    });

    let mut embedding = Array2::zeros((n, k));
    for (col, &e) in order.iter().take(k).enumerate() {
        for row in 0..n {
            embedding[[row, col]] = eigen.eigenvectors[(row, e)];
        }
    }

    for mut row in embedding.rows_mut() {
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row /= norm;
        }
    }

    embedding
}
