//! Dataset construction module

use std::collections::{BTreeMap, HashMap};

use ndarray::Array2;

use crate::data::Dataset;
use crate::error::{AggregationError, Result};

/// Builder for incrementally constructing a Dataset
pub struct DatasetBuilder {
    /// Mapping from string IDs to region indices
    id_to_index: HashMap<String, usize>,

    /// Region string IDs in insertion order
    region_ids: Vec<String>,

    centroids: Vec<Option<[f64; 2]>>,

    /// Table name -> region index -> series
    time_series: BTreeMap<String, HashMap<usize, Vec<f64>>>,

    /// Table name -> region index -> value
    attributes: BTreeMap<String, HashMap<usize, f64>>,

    /// Table name -> (from, to) -> weight
    connectivity: BTreeMap<String, HashMap<(usize, usize), f64>>,
}

impl DatasetBuilder {
    /// Create a new dataset builder with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id_to_index: HashMap::with_capacity(capacity),
            region_ids: Vec::with_capacity(capacity),
            centroids: Vec::with_capacity(capacity),
            time_series: BTreeMap::new(),
            attributes: BTreeMap::new(),
            connectivity: BTreeMap::new(),
        }
    }

    /// Shorthand for datasets carrying only centroids
    pub fn from_centroids<I, S>(regions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, [f64; 2])>,
        S: Into<String>,
    {
        let mut builder = Self::with_capacity(0);
        for (id, [x, y]) in regions {
            let id = id.into();
            builder.add_region(&id)?;
            builder.set_centroid(&id, x, y)?;
        }
        Ok(builder)
    }

    /// Register a new leaf region, returning its index
    pub fn add_region(&mut self, id: &str) -> Result<usize> {
        if self.id_to_index.contains_key(id) {
            return Err(AggregationError::DuplicateRegion(id.to_string()));
        }
        let idx = self.region_ids.len();
        self.id_to_index.insert(id.to_string(), idx);
        self.region_ids.push(id.to_string());
        self.centroids.push(None);
        Ok(idx)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.id_to_index
            .get(id)
            .copied()
            .ok_or_else(|| AggregationError::UnknownRegion(id.to_string()))
    }

    pub fn set_centroid(&mut self, id: &str, x: f64, y: f64) -> Result<()> {
        let idx = self.index_of(id)?;
        self.centroids[idx] = Some([x, y]);
        Ok(())
    }

    pub fn add_time_series(&mut self, table: &str, id: &str, series: Vec<f64>) -> Result<()> {
        let idx = self.index_of(id)?;
        self.time_series
            .entry(table.to_string())
            .or_default()
            .insert(idx, series);
        Ok(())
    }

    pub fn add_attribute(&mut self, table: &str, id: &str, value: f64) -> Result<()> {
        let idx = self.index_of(id)?;
        self.attributes
            .entry(table.to_string())
            .or_default()
            .insert(idx, value);
        Ok(())
    }

    /// Directed weight from `from` to `to`; self-connections are ignored
    pub fn add_connection(&mut self, table: &str, from: &str, to: &str, weight: f64) -> Result<()> {
        let src = self.index_of(from)?;
        let dst = self.index_of(to)?;
        let entries = self.connectivity.entry(table.to_string()).or_default();
        if src != dst {
            entries.insert((src, dst), weight);
        }
        Ok(())
    }

    /// Materialize dense per-region tables.
    ///
    /// Regions absent from a table get zeros; shape consistency is the
    /// caller's responsibility, so this never fails.
    pub fn build(self) -> Dataset {
        let n = self.region_ids.len();

        let time_series = self
            .time_series
            .into_iter()
            .map(|(name, mut rows)| {
                let width = rows.values().map(Vec::len).max().unwrap_or(0);
                let dense = (0..n)
                    .map(|i| {
                        let mut row = rows.remove(&i).unwrap_or_default();
                        if row.len() != width {
                            log::warn!("time series `{}` padded for region {}", name, i);
                            row.resize(width, 0.0);
                        }
                        row
                    })
                    .collect();
                (name, dense)
            })
            .collect();

        let attributes = self
            .attributes
            .into_iter()
            .map(|(name, values)| {
                let dense = (0..n).map(|i| values.get(&i).copied().unwrap_or(0.0)).collect();
                (name, dense)
            })
            .collect();

        let connectivity = self
            .connectivity
            .into_iter()
            .map(|(name, edges)| {
                let mut matrix = Array2::zeros((n, n));
                for ((src, dst), weight) in edges {
                    matrix[[src, dst]] = weight;
                }
                (name, matrix)
            })
            .collect();

        Dataset {
            region_ids: self.region_ids,
            index: self.id_to_index,
            centroids: self.centroids,
            time_series,
            attributes,
            connectivity,
        }
    }
}
