//! JSON dataset files for the command line tool

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::{Dataset, DatasetBuilder};

#[derive(Debug, Deserialize)]
struct RegionRecord {
    id: String,
    centroid: Option<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct ConnectionRecord {
    from: String,
    to: String,
    weight: f64,
}

/// On-disk layout of a dataset
#[derive(Debug, Deserialize)]
struct DatasetFile {
    regions: Vec<RegionRecord>,
    #[serde(default)]
    time_series: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
    #[serde(default)]
    attributes: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    connectivity: BTreeMap<String, Vec<ConnectionRecord>>,
}

/// Parse a dataset from JSON text
pub fn parse_dataset(text: &str) -> Result<Dataset> {
    let file: DatasetFile = serde_json::from_str(text).context("malformed dataset JSON")?;
    let mut builder = DatasetBuilder::with_capacity(file.regions.len());

    for region in &file.regions {
        builder.add_region(&region.id)?;
        if let Some([x, y]) = region.centroid {
            builder.set_centroid(&region.id, x, y)?;
        }
    }
    for (table, rows) in file.time_series {
        for (id, series) in rows {
            builder.add_time_series(&table, &id, series)?;
        }
    }
    for (table, values) in file.attributes {
        for (id, value) in values {
            builder.add_attribute(&table, &id, value)?;
        }
    }
    for (table, edges) in file.connectivity {
        for edge in edges {
            builder.add_connection(&table, &edge.from, &edge.to, edge.weight)?;
        }
    }

    Ok(builder.build())
}

/// Load a dataset from a JSON file
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    log::info!("Reading dataset file: {}", path.display());

    if !path.exists() {
        return Err(anyhow::anyhow!("File not found: {}", path.display()));
    }

    let text = std::fs::read_to_string(path)?;
    let dataset = parse_dataset(&text)?;
    log::info!(
        "Loaded {} regions ({} time series, {} attribute, {} connectivity tables)",
        dataset.len(),
        dataset.time_series().len(),
        dataset.attributes().len(),
        dataset.connectivity().len()
    );
    Ok(dataset)
}
