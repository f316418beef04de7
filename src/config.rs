//! Configuration management for the region aggregator

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AggregationError, Result};

/// Which aggregator builds the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    /// Agglomerative merging, strictly nested levels
    Hierarchical,
    /// Centroid-based flat partitions on whitened coordinates
    KMeans,
    /// Graph partitioning of the combined affinity matrix
    Spectral,
}

impl FromStr for AggregationStrategy {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hierarchical" => Ok(Self::Hierarchical),
            "kmeans" | "k-means" => Ok(Self::KMeans),
            "spectral" => Ok(Self::Spectral),
            _ => Err(AggregationError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hierarchical => write!(f, "hierarchical"),
            Self::KMeans => write!(f, "kmeans"),
            Self::Spectral => write!(f, "spectral"),
        }
    }
}

/// Distance-update rule between merged clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Single,
    Complete,
    Average,
    Centroid,
}

impl FromStr for Linkage {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "complete" => Ok(Self::Complete),
            "average" => Ok(Self::Average),
            "centroid" => Ok(Self::Centroid),
            _ => Err(AggregationError::UnknownLinkage(s.to_string())),
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::Complete => "complete",
            Self::Average => "average",
            Self::Centroid => "centroid",
        };
        write!(f, "{}", name)
    }
}

/// Per-table rescaling applied before weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureScaling {
    #[default]
    None,
    /// Map every table onto [0, 1] using its global min and max
    MinMax,
}

/// Scale factors for each feature category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    pub centroid: f64,
    pub time_series: f64,
    pub attributes: f64,
    pub connectivity: f64,

    /// Extra multiplier for individual named tables
    pub per_table: BTreeMap<String, f64>,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            centroid: 1.0,
            time_series: 1.0,
            attributes: 1.0,
            connectivity: 1.0,
            per_table: BTreeMap::new(),
        }
    }
}

impl FeatureWeights {
    /// Weight of a named table: category weight times its optional override
    pub fn table_weight(&self, category: f64, table: &str) -> f64 {
        category * self.per_table.get(table).copied().unwrap_or(1.0)
    }

    /// Reject negative or non-finite factors
    pub fn validate(&self) -> Result<()> {
        let categories = [
            ("centroid", self.centroid),
            ("time_series", self.time_series),
            ("attributes", self.attributes),
            ("connectivity", self.connectivity),
        ];

        let tables = self.per_table.iter().map(|(name, &w)| (name.as_str(), w));

        for (category, value) in categories.into_iter().chain(tables) {
            if !value.is_finite() || value < 0.0 {
                return Err(AggregationError::InvalidWeight {
                    category: category.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Configuration of a single aggregation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub strategy: AggregationStrategy,

    /// Linkage rule for the hierarchical strategy
    pub linkage: Linkage,

    pub weights: FeatureWeights,

    /// Dissimilarity used for zero or missing connectivity
    pub connectivity_cap: f64,

    /// Width of the Gaussian kernel for affinities
    pub kernel_delta: f64,

    pub scaling: FeatureScaling,

    /// Cluster counts to produce; `None` means every k from 1 to N
    pub cluster_counts: Option<Vec<usize>>,

    /// Seed for the centroid-based initialisation
    pub seed: u64,

    pub kmeans_max_iter: usize,
    pub kmeans_restarts: usize,
    pub kmeans_tolerance: f64,

    /// Separator used in human-readable cluster labels
    pub label_separator: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            strategy: AggregationStrategy::Hierarchical,
            linkage: Linkage::Average,
            weights: FeatureWeights::default(),
            connectivity_cap: 10_000.0,
            kernel_delta: 1.0,
            scaling: FeatureScaling::None,
            cluster_counts: None,
            seed: 0,
            kmeans_max_iter: 300,
            kmeans_restarts: 10,
            kmeans_tolerance: 1e-9,
            label_separator: "_".to_string(),
        }
    }
}

impl AggregationConfig {
    /// Create a new configuration with custom strategy and linkage
    pub fn new(strategy: AggregationStrategy, linkage: Linkage) -> Self {
        Self {
            strategy,
            linkage,
            ..Self::default()
        }
    }

    pub fn with_weights(mut self, weights: FeatureWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_connectivity_cap(mut self, cap: f64) -> Self {
        self.connectivity_cap = cap;
        self
    }

    pub fn with_cluster_counts(mut self, counts: Vec<usize>) -> Self {
        self.cluster_counts = Some(counts);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the numeric parameters before a run
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        for (category, value) in [
            ("connectivity_cap", self.connectivity_cap),
            ("kernel_delta", self.kernel_delta),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AggregationError::InvalidWeight {
                    category: category.to_string(),
                    value,
                });
            }
        }
        if self.label_separator.is_empty() {
            return Err(AggregationError::EmptySeparator);
        }
        Ok(())
    }

    /// Resolve the requested cluster counts against `n` leaf regions,
    /// sorted descending and deduplicated.
    pub fn resolve_cluster_counts(&self, n: usize) -> Result<Vec<usize>> {
        let mut counts = match &self.cluster_counts {
            Some(counts) => {
                for &k in counts {
                    if k == 0 || k > n {
                        return Err(AggregationError::InvalidClusterCount {
                            requested: k,
                            regions: n,
                        });
                    }
                }
                counts.clone()
            }
            None => (1..=n).collect(),
        };
        counts.sort_unstable_by(|a, b| b.cmp(a));
        counts.dedup();
        Ok(counts)
    }
}
