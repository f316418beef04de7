//! Aggregation entry point: features -> distances -> aggregator -> hierarchy

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cluster::hierarchical::{HierarchicalAggregator, MergeTree};
use crate::cluster::kmeans::{kmeans, KMeansSettings};
use crate::cluster::metrics::cophenetic_correlation;
use crate::cluster::spectral::{affinity_matrix, spectral_labels};
use crate::config::{AggregationConfig, AggregationStrategy};
use crate::data::preprocessing::whiten;
use crate::data::{Dataset, FeatureExtractor, FeatureMatrix};
use crate::distance::{DistanceMatrix, DistanceMetric};
use crate::error::Result;
use crate::hierarchy::{AggregationHierarchy, AggregationLevel, ClusterLabeler};

/// Side results of a run, for diagnostics only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Hierarchical runs: fit of the tree to the input distances
    pub cophenetic_correlation: Option<f64>,

    /// Centroid-based runs: within-cluster sum of squares per k
    pub distortion: BTreeMap<usize, f64>,
}

/// Everything produced by one aggregation call
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationOutcome {
    pub hierarchy: AggregationHierarchy,

    /// Merge history, present for the hierarchical strategy
    pub merge_tree: Option<MergeTree>,

    pub diagnostics: Diagnostics,
}

/// Aggregate the dataset's leaf regions for every requested cluster count.
///
/// Pure function of its inputs; identical inputs give identical outcomes.
pub fn aggregate(dataset: &Dataset, config: &AggregationConfig) -> Result<AggregationOutcome> {
    config.validate()?;
    let counts = config.resolve_cluster_counts(dataset.len())?;
    let labeler = ClusterLabeler::new(&config.label_separator, dataset.region_ids())?;

    log::info!(
        "Aggregating {} regions with {} strategy into {} levels",
        dataset.len(),
        config.strategy,
        counts.len()
    );

    let outcome = match config.strategy {
        AggregationStrategy::Hierarchical => run_hierarchical(dataset, config, &counts, &labeler)?,
        AggregationStrategy::KMeans => run_kmeans(dataset, config, &counts, &labeler)?,
        AggregationStrategy::Spectral => run_spectral(dataset, config, &counts, &labeler)?,
    };

    log::info!("Aggregation produced {} levels", outcome.hierarchy.len());
    Ok(outcome)
}

fn extract(dataset: &Dataset, config: &AggregationConfig) -> Result<(FeatureMatrix, DistanceMetric)> {
    let features = FeatureExtractor::new(&config.weights, config.scaling).extract(dataset)?;
    let metric = DistanceMetric::new(config.connectivity_cap, config.weights.connectivity);
    Ok((features, metric))
}

fn run_hierarchical(
    dataset: &Dataset,
    config: &AggregationConfig,
    counts: &[usize],
    labeler: &ClusterLabeler,
) -> Result<AggregationOutcome> {
    let (features, metric) = extract(dataset, config)?;
    let distances = DistanceMatrix::build(&features, &metric, dataset.region_ids())?;
    let tree = HierarchicalAggregator::new(config.linkage).build(&distances);

    let cophenetic = cophenetic_correlation(&tree, &distances);
    if let Some(c) = cophenetic {
        log::info!("Cophenetic correlation coefficient: {:.4}", c);
    }

    let hierarchy = AggregationHierarchy::from_merge_tree(&tree, dataset.region_ids(), counts, labeler)?;

    Ok(AggregationOutcome {
        hierarchy,
        merge_tree: Some(tree),
        diagnostics: Diagnostics {
            cophenetic_correlation: cophenetic,
            ..Diagnostics::default()
        },
    })
}

fn run_kmeans(
    dataset: &Dataset,
    config: &AggregationConfig,
    counts: &[usize],
    labeler: &ClusterLabeler,
) -> Result<AggregationOutcome> {
    let points = whiten(&dataset.centroid_matrix()?);
    let settings = KMeansSettings::from(config);

    let mut hierarchy = AggregationHierarchy::new(dataset.region_ids().to_vec(), false);
    let mut distortion = BTreeMap::new();

    for &k in counts {
        let result = kmeans(points.view(), k, &settings)?;
        log::debug!("k-means k={} distortion {:.6}", k, result.inertia);
        distortion.insert(k, result.inertia);
        hierarchy.insert(AggregationLevel::from_labels(k, &result.labels, dataset.region_ids(), labeler));
    }

    Ok(AggregationOutcome {
        hierarchy,
        merge_tree: None,
        diagnostics: Diagnostics {
            distortion,
            ..Diagnostics::default()
        },
    })
}

fn run_spectral(
    dataset: &Dataset,
    config: &AggregationConfig,
    counts: &[usize],
    labeler: &ClusterLabeler,
) -> Result<AggregationOutcome> {
    let (features, metric) = extract(dataset, config)?;
    let affinity = affinity_matrix(&features, &metric, config.kernel_delta);
    let settings = KMeansSettings::from(config);

    let mut hierarchy = AggregationHierarchy::new(dataset.region_ids().to_vec(), false);
    for &k in counts {
        let labels = spectral_labels(&affinity, k, &settings)?;
        hierarchy.insert(AggregationLevel::from_labels(k, &labels, dataset.region_ids(), labeler));
    }

    Ok(AggregationOutcome {
        hierarchy,
        merge_tree: None,
        diagnostics: Diagnostics::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Linkage;
    use crate::data::DatasetBuilder;
    use crate::error::AggregationError;

    fn square() -> Dataset {
        DatasetBuilder::from_centroids([
            ("A", [0.0, 0.0]),
            ("B", [1.0, 0.0]),
            ("C", [0.0, 1.0]),
            ("D", [1.0, 1.0]),
        ])
        .unwrap()
        .build()
    }

    #[test]
    fn hierarchical_outcome_has_tree_and_cophenetic() {
        let outcome = aggregate(&square(), &AggregationConfig::default()).unwrap();
        assert_eq!(outcome.hierarchy.len(), 4);
        assert!(outcome.hierarchy.is_nested());
        assert_eq!(outcome.merge_tree.as_ref().map(|t| t.merges().len()), Some(3));
        assert!(outcome.diagnostics.cophenetic_correlation.is_some());
    }

    #[test]
    fn kmeans_records_distortion() {
        let config = AggregationConfig::new(AggregationStrategy::KMeans, Linkage::Average);
        let outcome = aggregate(&square(), &config).unwrap();
        assert_eq!(outcome.diagnostics.distortion.len(), 4);
        assert_eq!(outcome.diagnostics.distortion[&4], 0.0);
        assert!(outcome.merge_tree.is_none());
        assert!(outcome.hierarchy.check_partition());
    }

    #[test]
    fn kmeans_requires_centroids() {
        let mut builder = DatasetBuilder::with_capacity(2);
        builder.add_region("x").unwrap();
        builder.add_region("y").unwrap();
        builder.add_attribute("load", "x", 1.0).unwrap();
        builder.add_attribute("load", "y", 2.0).unwrap();
        let dataset = builder.build();

        let config = AggregationConfig::new(AggregationStrategy::KMeans, Linkage::Average);
        assert_eq!(aggregate(&dataset, &config), Err(AggregationError::MissingCentroid("x".into())));

        // the hierarchical strategy works from attributes alone
        let outcome = aggregate(&dataset, &AggregationConfig::default()).unwrap();
        assert_eq!(outcome.hierarchy.level(1).unwrap().clusters()[0].id, "x_y");
    }

    #[test]
    fn rejects_out_of_range_counts() {
        let config = AggregationConfig::default().with_cluster_counts(vec![5]);
        assert_eq!(
            aggregate(&square(), &config),
            Err(AggregationError::InvalidClusterCount { requested: 5, regions: 4 })
        );
    }

    #[test]
    fn degenerate_datasets() {
        let empty = DatasetBuilder::with_capacity(0).build();
        for strategy in [AggregationStrategy::Hierarchical, AggregationStrategy::KMeans, AggregationStrategy::Spectral] {
            let config = AggregationConfig::new(strategy, Linkage::Average);
            let outcome = aggregate(&empty, &config).unwrap();
            assert!(outcome.hierarchy.is_empty());
        }

        let single = DatasetBuilder::from_centroids([("solo", [3.0, 4.0])]).unwrap().build();
        let outcome = aggregate(&single, &AggregationConfig::default()).unwrap();
        assert_eq!(outcome.hierarchy.cluster_counts(), vec![1]);
        assert_eq!(outcome.hierarchy.level(1).unwrap().clusters()[0].members, vec!["solo"]);
    }
}
