use std::collections::BTreeSet;

use region_aggregator::data::json::parse_dataset;
use region_aggregator::data::FeatureExtractor;
use region_aggregator::distance::DistanceMetric;
use region_aggregator::{
    aggregate, AggregationConfig, AggregationError, AggregationStrategy, Dataset, DatasetBuilder, Linkage,
};

fn unit_square() -> Dataset {
    DatasetBuilder::from_centroids([
        ("A", [0.0, 0.0]),
        ("B", [1.0, 0.0]),
        ("C", [0.0, 1.0]),
        ("D", [1.0, 1.0]),
    ])
    .unwrap()
    .build()
}

fn member_sets(dataset: &Dataset, config: &AggregationConfig, k: usize) -> BTreeSet<BTreeSet<String>> {
    let outcome = aggregate(dataset, config).unwrap();
    outcome
        .hierarchy
        .level(k)
        .unwrap()
        .clusters()
        .iter()
        .map(|c| c.members.iter().cloned().collect())
        .collect()
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn unit_square_average_linkage_merges_edges_before_diagonals() {
    let dataset = unit_square();
    let outcome = aggregate(&dataset, &AggregationConfig::default()).unwrap();
    let hierarchy = &outcome.hierarchy;

    let k3 = hierarchy.level(3).unwrap();
    assert_eq!(k3.len(), 3);
    assert_eq!(k3.get("A_B").unwrap().members, vec!["A", "B"]);
    assert_eq!(k3.get("C").unwrap().members, vec!["C"]);
    assert_eq!(k3.get("D").unwrap().members, vec!["D"]);

    let k2 = hierarchy.level(2).unwrap();
    assert_eq!(k2.len(), 2);
    assert_eq!(k2.get("A_B").unwrap().members, vec!["A", "B"]);
    assert_eq!(k2.get("C_D").unwrap().members, vec!["C", "D"]);

    let k1 = hierarchy.level(1).unwrap();
    assert_eq!(k1.len(), 1);
    assert_eq!(k1.clusters()[0].id, "A_B_C_D");
    assert_eq!(k1.clusters()[0].members, vec!["A", "B", "C", "D"]);

    let tree = outcome.merge_tree.unwrap();
    assert_eq!(tree.merges()[0].distance, 1.0);
    assert_eq!(tree.merges()[1].distance, 1.0);
    assert!(tree.merges()[2].distance > 1.0);
}

#[test]
fn every_linkage_satisfies_partition_and_nesting() {
    for linkage in [Linkage::Single, Linkage::Complete, Linkage::Average, Linkage::Centroid] {
        let config = AggregationConfig::new(AggregationStrategy::Hierarchical, linkage);
        let outcome = aggregate(&unit_square(), &config).unwrap();
        let hierarchy = &outcome.hierarchy;

        assert_eq!(hierarchy.cluster_counts(), vec![4, 3, 2, 1], "{}", linkage);
        assert!(hierarchy.check_partition(), "{}", linkage);
        assert!(hierarchy.check_nesting(), "{}", linkage);
    }
}

#[test]
fn identity_and_single_cluster_levels() {
    for strategy in [AggregationStrategy::Hierarchical, AggregationStrategy::KMeans, AggregationStrategy::Spectral] {
        let config = AggregationConfig::new(strategy, Linkage::Average);
        let dataset = unit_square();

        let finest = member_sets(&dataset, &config, 4);
        let singletons: BTreeSet<BTreeSet<String>> = ["A", "B", "C", "D"].iter().map(|&id| set(&[id])).collect();
        assert_eq!(finest, singletons, "{}", strategy);

        let coarsest = member_sets(&dataset, &config, 1);
        assert_eq!(coarsest, BTreeSet::from([set(&["A", "B", "C", "D"])]), "{}", strategy);
    }
}

#[test]
fn isolated_region_gets_capped_structural_term() {
    let mut builder = DatasetBuilder::from_centroids([("A", [0.0, 0.0]), ("B", [3.0, 0.0]), ("X", [0.0, 4.0])]).unwrap();
    builder.add_connection("lines", "A", "B", 2.0).unwrap();
    let dataset = builder.build();

    let config = AggregationConfig::default().with_connectivity_cap(100.0);
    let features = FeatureExtractor::new(&config.weights, config.scaling)
        .extract(&dataset)
        .unwrap();
    let metric = DistanceMetric::new(config.connectivity_cap, config.weights.connectivity);

    let x = dataset.position("X").unwrap();
    for other in ["A", "B"] {
        let o = dataset.position(other).unwrap();
        assert_eq!(metric.structural(&features, x, o), 100.0);
        assert_eq!(metric.structural(&features, o, x), 100.0);
        assert!(metric.distance(&features, x, o).is_finite());
    }
    assert_eq!(metric.distance(&features, 0, 2), 104.0);
    // mean of the directed strengths 2 and 0
    assert_eq!(metric.structural(&features, 0, 1), 1.0);
    assert_eq!(metric.distance(&features, 0, 1), 4.0);

    let outcome = aggregate(&dataset, &config).unwrap();
    let k2 = outcome.hierarchy.level(2).unwrap();
    assert_eq!(k2.get("X").unwrap().members, vec!["X"]);
    assert_eq!(k2.get("A_B").unwrap().members, vec!["A", "B"]);
}

#[test]
fn identical_inputs_give_identical_outputs() {
    let text = r#"{
        "regions": [
            {"id": "01_es", "centroid": [0.0, 0.0]},
            {"id": "02_es", "centroid": [0.5, 0.2]},
            {"id": "03_fr", "centroid": [3.0, 1.0]},
            {"id": "04_fr", "centroid": [3.2, 1.4]},
            {"id": "05_de", "centroid": [6.0, 0.0]},
            {"id": "06_de", "centroid": [6.1, 0.3]}
        ],
        "time_series": {"demand": {
            "01_es": [1.0, 2.0], "02_es": [1.1, 2.1], "03_fr": [4.0, 1.0],
            "04_fr": [4.2, 0.9], "05_de": [2.0, 2.0], "06_de": [2.1, 2.0]
        }},
        "connectivity": {"lines": [
            {"from": "01_es", "to": "02_es", "weight": 5.0},
            {"from": "03_fr", "to": "04_fr", "weight": 1.0},
            {"from": "04_fr", "to": "05_de", "weight": 0.5}
        ]}
    }"#;
    let dataset = parse_dataset(text).unwrap();

    for strategy in [AggregationStrategy::Hierarchical, AggregationStrategy::KMeans, AggregationStrategy::Spectral] {
        let config = AggregationConfig::new(strategy, Linkage::Average).with_seed(7);
        let first = aggregate(&dataset, &config).unwrap();
        let second = aggregate(&dataset, &config).unwrap();

        assert_eq!(first, second, "{}", strategy);
        assert_eq!(
            serde_json::to_string(&first.hierarchy.to_mapping()).unwrap(),
            serde_json::to_string(&second.hierarchy.to_mapping()).unwrap(),
            "{}",
            strategy
        );
        assert!(first.hierarchy.check_partition(), "{}", strategy);
    }
}

#[test]
fn flattening_any_level_reproduces_leaf_set() {
    let dataset = unit_square();
    for strategy in [AggregationStrategy::Hierarchical, AggregationStrategy::KMeans, AggregationStrategy::Spectral] {
        let outcome = aggregate(&dataset, &AggregationConfig::new(strategy, Linkage::Average)).unwrap();
        for level in outcome.hierarchy.levels() {
            let flat: BTreeSet<String> = level.flatten().into_iter().collect();
            assert_eq!(flat, set(&["A", "B", "C", "D"]));
            assert_eq!(level.flatten().len(), 4);
        }
    }
}

#[test]
fn requested_counts_only() {
    let config = AggregationConfig::default().with_cluster_counts(vec![1, 3, 3]);
    let outcome = aggregate(&unit_square(), &config).unwrap();
    assert_eq!(outcome.hierarchy.cluster_counts(), vec![3, 1]);
    assert_eq!(outcome.hierarchy.level(2), Err(AggregationError::LevelNotComputed(2)));
}

#[test]
fn precondition_failures_are_typed() {
    let dataset = unit_square();

    let zero = AggregationConfig::default().with_cluster_counts(vec![0]);
    assert_eq!(
        aggregate(&dataset, &zero),
        Err(AggregationError::InvalidClusterCount { requested: 0, regions: 4 })
    );

    assert_eq!(
        "ward".parse::<AggregationStrategy>(),
        Err(AggregationError::UnknownStrategy("ward".into()))
    );

    let mut builder = DatasetBuilder::with_capacity(2);
    builder.add_region("P").unwrap();
    builder.add_region("Q").unwrap();
    builder.set_centroid("P", 0.0, 0.0).unwrap();
    let partial = builder.build();
    assert_eq!(
        aggregate(&partial, &AggregationConfig::default()),
        Err(AggregationError::MissingCentroid("Q".into()))
    );
}

#[test]
fn separator_collisions_keep_labels_distinct() {
    // without escaping both two-member clusters would read "a_b_c"
    let dataset = DatasetBuilder::from_centroids([("a_b", [0.0, 0.0]), ("c", [0.1, 0.0]), ("a", [10.0, 0.0]), ("b_c", [10.1, 0.0])])
        .unwrap()
        .build();
    let outcome = aggregate(&dataset, &AggregationConfig::default()).unwrap();
    let k2 = outcome.hierarchy.level(2).unwrap();
    assert_eq!(k2.len(), 2);
    assert_ne!(k2.clusters()[0].id, k2.clusters()[1].id);
    assert!(outcome.hierarchy.check_partition());
}
