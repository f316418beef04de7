//! Results persistence module

use anyhow::Result;
use serde_json::{json, to_string_pretty};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::aggregate::AggregationOutcome;
use crate::cluster::metrics::connectivity_density;
use crate::config::AggregationConfig;
use crate::data::{Dataset, FeatureExtractor};

/// Save aggregation results to the specified directory
pub fn save_results(
    outcome: &AggregationOutcome,
    dataset: &Dataset,
    config: &AggregationConfig,
    output_dir: &str,
) -> Result<()> {
    log::info!("Saving {} levels to {}", outcome.hierarchy.len(), output_dir);

    fs::create_dir_all(output_dir)?;

    save_hierarchy(outcome, output_dir)?;
    save_summary(outcome, dataset, config, output_dir)?;

    if let Some(tree) = &outcome.merge_tree {
        let path = Path::new(output_dir).join("merges.json");
        let mut file = File::create(path)?;
        file.write_all(to_string_pretty(tree)?.as_bytes())?;
    }

    log::info!("Results saved successfully");

    Ok(())
}

/// `{k: {cluster id: [region ids]}}`
fn save_hierarchy(outcome: &AggregationOutcome, output_dir: &str) -> Result<()> {
    let path = Path::new(output_dir).join("hierarchy.json");
    let mut file = File::create(path)?;
    file.write_all(to_string_pretty(&outcome.hierarchy.to_mapping())?.as_bytes())?;
    Ok(())
}

/// Save summary information
fn save_summary(
    outcome: &AggregationOutcome,
    dataset: &Dataset,
    config: &AggregationConfig,
    output_dir: &str,
) -> Result<()> {
    log::info!("Saving summary information");

    let path = Path::new(output_dir).join("summary.json");
    let mut file = File::create(path)?;

    // connection density per cluster, only meaningful with connectivity data
    let part2 = FeatureExtractor::new(&config.weights, config.scaling)
        .extract(dataset)?
        .part2;

    let levels: Vec<_> = outcome
        .hierarchy
        .levels()
        .map(|level| {
            let sizes: Vec<usize> = level.clusters().iter().map(|c| c.members.len()).collect();
            let density = part2.as_ref().map(|part2| {
                let total: f64 = level
                    .clusters()
                    .iter()
                    .map(|c| {
                        let members: Vec<usize> = c
                            .members
                            .iter()
                            .filter_map(|id| dataset.position(id).ok())
                            .collect();
                        connectivity_density(part2, &members)
                    })
                    .sum();
                total / level.len().max(1) as f64
            });
            json!({
                "k": level.k,
                "cluster_count": level.len(),
                "largest_cluster_size": sizes.iter().max().copied().unwrap_or(0),
                "smallest_cluster_size": sizes.iter().min().copied().unwrap_or(0),
                "avg_connectivity_density": density,
            })
        })
        .collect();

    let summary = json!({
        "region_count": dataset.len(),
        "strategy": config.strategy.to_string(),
        "linkage": config.linkage.to_string(),
        "nested": outcome.hierarchy.is_nested(),
        "cophenetic_correlation": outcome.diagnostics.cophenetic_correlation,
        "distortion": outcome.diagnostics.distortion,
        "levels": levels,
    });

    file.write_all(to_string_pretty(&summary)?.as_bytes())?;

    Ok(())
}
