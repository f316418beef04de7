//! Centroid-seeking flat partitions

use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::AggregationConfig;
use crate::data::preprocessing::squared_euclidean;
use crate::error::{AggregationError, Result};

/// Iteration controls for Lloyd's algorithm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansSettings {
    pub max_iter: usize,
    pub restarts: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl From<&AggregationConfig> for KMeansSettings {
    fn from(config: &AggregationConfig) -> Self {
        Self {
            max_iter: config.kmeans_max_iter,
            restarts: config.kmeans_restarts,
            tolerance: config.kmeans_tolerance,
            seed: config.seed,
        }
    }
}

impl Default for KMeansSettings {
    fn default() -> Self {
        Self::from(&AggregationConfig::default())
    }
}

/// Outcome of one k-means run
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster label per point, numbered by first appearance
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squared distances
    pub inertia: f64,
}

/// Partition `points` into exactly `k` non-empty clusters.
///
/// `k == n` yields the identity partition and `k == 1` a single cluster
/// without iterating. Otherwise the best of `restarts` seeded k-means++
/// runs is kept; on equal inertia the earliest restart wins.
pub fn kmeans(points: ArrayView2<f64>, k: usize, settings: &KMeansSettings) -> Result<KMeansResult> {
    let n = points.nrows();
    if k == 0 || k > n {
        return Err(AggregationError::InvalidClusterCount {
            requested: k,
            regions: n,
        });
    }

    if k == n {
        return Ok(KMeansResult {
            labels: (0..n).collect(),
            centroids: points.to_owned(),
            inertia: 0.0,
        });
    }

    if k == 1 {
        let labels = vec![0; n];
        let centroids = compute_centroids(points, &labels, 1);
        let inertia = inertia(points, &labels, &centroids);
        return Ok(KMeansResult {
            labels,
            centroids,
            inertia,
        });
    }

    let restarts = settings.restarts.max(1);
    let runs: Vec<KMeansResult> = (0..restarts)
        .into_par_iter()
        .map(|r| lloyd(points, k, settings, settings.seed.wrapping_add(r as u64)))
        .collect();

    let best = runs
        .into_iter()
        .reduce(|best, run| if run.inertia < best.inertia { run } else { best })
        .ok_or(AggregationError::InvalidClusterCount {
            requested: k,
            regions: n,
        })?;

    Ok(canonicalize(best, k))
}

/// Within-cluster sum of squared distances
pub fn inertia(points: ArrayView2<f64>, labels: &[usize], centroids: &Array2<f64>) -> f64 {
    points
        .axis_iter(Axis(0))
        .zip(labels)
        .map(|(p, &l)| squared_euclidean(p, centroids.row(l)))
        .sum()
}

fn lloyd(points: ArrayView2<f64>, k: usize, settings: &KMeansSettings, seed: u64) -> KMeansResult {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut centroids = plus_plus(points, k, &mut rng);
    let mut labels = vec![0; points.nrows()];

    for iteration in 0..settings.max_iter.max(1) {
        assign(points, &centroids, &mut labels);
        repair_empty(points, &mut centroids, &mut labels, k);

        let next = compute_centroids(points, &labels, k);
        let shift: f64 = centroids
            .axis_iter(Axis(0))
            .zip(next.axis_iter(Axis(0)))
            .map(|(a, b)| squared_euclidean(a, b))
            .sum();
        centroids = next;

        if shift <= settings.tolerance {
            log::trace!("k-means k={} converged after {} iterations", k, iteration + 1);
            break;
        }
    }

    assign(points, &centroids, &mut labels);
    repair_empty(points, &mut centroids, &mut labels, k);
    let centroids = compute_centroids(points, &labels, k);
    let inertia = inertia(points, &labels, &centroids);

    KMeansResult {
        labels,
        centroids,
        inertia,
    }
}

/// k-means++ seeding: each further center is drawn with probability
/// proportional to the squared distance to the nearest chosen center.
fn plus_plus(points: ArrayView2<f64>, k: usize, rng: &mut SmallRng) -> Array2<f64> {
    let n = points.nrows();
    let mut chosen = Vec::with_capacity(k);
    chosen.push(rng.gen_range(0..n));

    let mut nearest: Vec<f64> = (0..n)
        .map(|i| squared_euclidean(points.row(i), points.row(chosen[0])))
        .collect();

    while chosen.len() < k {
        let total: f64 = nearest.iter().sum();
        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            nearest
                .iter()
                .position(|&d| {
                    acc += d;
                    acc > target && d > 0.0
                })
                .unwrap_or_else(|| nearest.iter().rposition(|&d| d > 0.0).unwrap_or(0))
        } else {
            // every remaining point coincides with a center
            (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
        };
        chosen.push(next);

        for (i, d) in nearest.iter_mut().enumerate() {
            *d = d.min(squared_euclidean(points.row(i), points.row(next)));
        }
    }

    points.select(Axis(0), &chosen)
}

/// Nearest centroid per point; ties go to the lower centroid index
fn assign(points: ArrayView2<f64>, centroids: &Array2<f64>, labels: &mut [usize]) {
    for (i, label) in labels.iter_mut().enumerate() {
        let p = points.row(i);
        let mut best = (f64::INFINITY, 0);
        for (c, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
            let d = squared_euclidean(p, centroid);
            if d < best.0 {
                best = (d, c);
            }
        }
        *label = best.1;
    }
}

/// Give every empty cluster the point farthest from its own centroid,
/// taken from a cluster that still has more than one member.
fn repair_empty(points: ArrayView2<f64>, centroids: &mut Array2<f64>, labels: &mut [usize], k: usize) {
    let mut counts = vec![0usize; k];
    for &l in labels.iter() {
        counts[l] += 1;
    }

    for empty in 0..k {
        if counts[empty] > 0 {
            continue;
        }
        let donor = labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| counts[l] > 1)
            .map(|(i, &l)| (i, squared_euclidean(points.row(i), centroids.row(l))))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((i, d)),
            });

        if let Some((i, _)) = donor {
            counts[labels[i]] -= 1;
            labels[i] = empty;
            counts[empty] = 1;
            centroids.row_mut(empty).assign(&points.row(i));
        }
    }
}

fn compute_centroids(points: ArrayView2<f64>, labels: &[usize], k: usize) -> Array2<f64> {
    let mut sums = Array2::zeros((k, points.ncols()));
    let mut counts = vec![0usize; k];
    for (p, &l) in points.axis_iter(Axis(0)).zip(labels) {
        let mut row = sums.row_mut(l);
        row += &p;
        counts[l] += 1;
    }
    for (mut row, &count) in sums.axis_iter_mut(Axis(0)).zip(&counts) {
        if count > 0 {
            row /= count as f64;
        }
    }
    sums
}

/// Renumber labels by first appearance so equal partitions compare equal
fn canonicalize(result: KMeansResult, k: usize) -> KMeansResult {
    let mut mapping = vec![usize::MAX; k];
    let mut next = 0;
    let labels: Vec<usize> = result
        .labels
        .iter()
        .map(|&l| {
            if mapping[l] == usize::MAX {
                mapping[l] = next;
                next += 1;
            }
            mapping[l]
        })
        .collect();

    let mut order = vec![0; k];
    for (old, &new) in mapping.iter().enumerate() {
        if new != usize::MAX {
            order[new] = old;
        }
    }
    let centroids = result.centroids.select(Axis(0), &order);

    KMeansResult {
        labels,
        centroids,
        inertia: result.inertia,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [10.0, 10.0],
            [10.1, 10.0],
            [10.0, 10.1],
        ]
    }

    #[test]
    fn separates_obvious_blobs() {
        let points = blobs();
        let result = kmeans(points.view(), 2, &KMeansSettings::default()).unwrap();
        assert_eq!(result.labels, vec![0, 0, 0, 1, 1, 1]);
        assert!(result.inertia < 0.1);
    }

    #[test]
    fn extreme_cluster_counts() {
        let points = blobs();
        let all = kmeans(points.view(), 6, &KMeansSettings::default()).unwrap();
        assert_eq!(all.labels, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(all.inertia, 0.0);

        let one = kmeans(points.view(), 1, &KMeansSettings::default()).unwrap();
        assert_eq!(one.labels, vec![0; 6]);
        assert!((one.centroids[[0, 0]] - 5.033333333333333).abs() < 1e-9);
    }

    #[test]
    fn invalid_k_is_rejected() {
        let points = blobs();
        assert!(kmeans(points.view(), 0, &KMeansSettings::default()).is_err());
        assert_eq!(
            kmeans(points.view(), 7, &KMeansSettings::default()),
            Err(AggregationError::InvalidClusterCount { requested: 7, regions: 6 })
        );
    }

    #[test]
    fn duplicate_points_still_fill_every_cluster() {
        let points = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let result = kmeans(points.view(), 3, &KMeansSettings::default()).unwrap();
        let mut seen = result.labels.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn same_seed_same_partition() {
        let points = array![[0.0, 0.0], [1.0, 0.3], [2.2, 0.1], [3.1, 0.0], [4.0, 0.2], [5.3, 0.1], [6.0, 0.0]];
        let settings = KMeansSettings { seed: 42, ..KMeansSettings::default() };
        let first = kmeans(points.view(), 3, &settings).unwrap();
        let second = kmeans(points.view(), 3, &settings).unwrap();
        assert_eq!(first, second);
    }
}
