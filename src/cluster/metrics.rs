//! Cluster statistics and diagnostics

use ndarray::Array2;
use statrs::statistics::Statistics;

use crate::cluster::hierarchical::MergeTree;
use crate::distance::DistanceMatrix;

/// Merge distance at which each leaf pair first shares a cluster
pub fn cophenetic_distances(tree: &MergeTree) -> Array2<f64> {
    let n = tree.leaf_count();
    let mut cophenetic = Array2::zeros((n, n));

    for merge in tree.merges() {
        let left = tree.members(merge.left);
        let right = tree.members(merge.right);
        for &a in &left {
            for &b in &right {
                cophenetic[[a, b]] = merge.distance;
                cophenetic[[b, a]] = merge.distance;
            }
        }
    }

    cophenetic
}

/// Pearson correlation between cophenetic and input distances.
///
/// `None` with fewer than two pairs or when either side has no spread.
pub fn cophenetic_correlation(tree: &MergeTree, distances: &DistanceMatrix) -> Option<f64> {
    let cophenetic = DistanceMatrix::from_array(cophenetic_distances(tree)).condensed();
    let original = distances.condensed();
    if original.len() < 2 {
        return None;
    }

    let covariance = cophenetic.iter().covariance(original.iter());
    let spread = cophenetic.iter().std_dev() * original.iter().std_dev();
    let correlation = covariance / spread;

    correlation.is_finite().then_some(correlation)
}

/// Share of ordered member pairs joined by a positive connection
pub fn connectivity_density(part2: &Array2<f64>, members: &[usize]) -> f64 {
    let n = members.len();
    if n <= 1 {
        return 1.0; // By convention, singleton clusters have density 1
    }

    let potential = n * (n - 1);
    let actual = members
        .iter()
        .flat_map(|&a| members.iter().map(move |&b| (a, b)))
        .filter(|&(a, b)| a != b && part2[[a, b]] > 0.0)
        .count();

    actual as f64 / potential as f64
}
