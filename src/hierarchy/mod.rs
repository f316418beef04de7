//! Leveled aggregation output consumed by the spatial reduction step

pub mod labels;

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::cluster::hierarchical::MergeTree;
use crate::error::{AggregationError, Result};

pub use labels::ClusterLabeler;

/// A group of leaf regions at one level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Label derived from the member list
    pub id: String,

    /// Leaf region ids, never empty
    pub members: Vec<String>,

    /// Labels of the two clusters merged into this one (hierarchical only)
    pub parents: Option<(String, String)>,
}

/// Partition of all leaf regions into `k` clusters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationLevel {
    pub k: usize,
    clusters: Vec<Cluster>,
}

impl AggregationLevel {
    pub fn new(k: usize, clusters: Vec<Cluster>) -> Self {
        Self { k, clusters }
    }

    /// Group leaves by label; clusters ordered by first member, members in leaf order
    pub fn from_labels(k: usize, labels: &[usize], leaf_ids: &[String], labeler: &ClusterLabeler) -> Self {
        let mut groups: Vec<(usize, Vec<String>)> = Vec::new();
        for (id, &label) in leaf_ids.iter().zip(labels) {
            match groups.iter_mut().find(|(l, _)| *l == label) {
                Some((_, members)) => members.push(id.clone()),
                None => groups.push((label, vec![id.clone()])),
            }
        }

        let clusters = groups
            .into_iter()
            .map(|(_, members)| Cluster {
                id: labeler.label(&members),
                members,
                parents: None,
            })
            .collect();

        Self { k, clusters }
    }

    /// Active clusters of a merge tree cut at `k`, in node-index order
    pub fn from_merge_tree(tree: &MergeTree, k: usize, leaf_ids: &[String], labeler: &ClusterLabeler) -> Result<Self> {
        let label_of = |node: usize| {
            let members: Vec<&String> = tree.members(node).into_iter().map(|i| &leaf_ids[i]).collect();
            labeler.label(&members)
        };

        let clusters = tree
            .cut(k)?
            .into_iter()
            .map(|node| Cluster {
                id: label_of(node),
                members: tree.members(node).into_iter().map(|i| leaf_ids[i].clone()).collect(),
                parents: tree.children(node).map(|(l, r)| (label_of(l), label_of(r))),
            })
            .collect();

        Ok(Self { k, clusters })
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    /// Cluster containing a given leaf
    pub fn cluster_of(&self, leaf: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.members.iter().any(|m| m == leaf))
    }

    /// Cluster id -> member ids
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.clusters
            .iter()
            .map(|c| (c.id.clone(), c.members.clone()))
            .collect()
    }

    /// All member ids, deduplicated, in first-seen order
    pub fn flatten(&self) -> Vec<String> {
        self.clusters
            .iter()
            .flat_map(|c| c.members.iter().cloned())
            .unique()
            .collect()
    }

    /// Members disjoint, non-empty, covering exactly `leaf_ids`; ids unique
    pub fn is_partition_of(&self, leaf_ids: &[String]) -> bool {
        let mut seen = HashSet::new();
        let members_ok = self
            .clusters
            .iter()
            .all(|c| !c.members.is_empty() && c.members.iter().all(|m| seen.insert(m.as_str())));
        let ids_unique = self.clusters.iter().map(|c| &c.id).all_unique();

        members_ok
            && ids_unique
            && seen.len() == leaf_ids.len()
            && leaf_ids.iter().all(|id| seen.contains(id.as_str()))
    }
}

/// All computed levels, keyed by cluster count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationHierarchy {
    leaf_ids: Vec<String>,
    levels: BTreeMap<usize, AggregationLevel>,

    /// True when levels come from one merge tree
    nested: bool,
}

impl AggregationHierarchy {
    pub fn new(leaf_ids: Vec<String>, nested: bool) -> Self {
        Self {
            leaf_ids,
            levels: BTreeMap::new(),
            nested,
        }
    }

    /// Levels of a merge tree for each requested `k`
    pub fn from_merge_tree(tree: &MergeTree, leaf_ids: &[String], counts: &[usize], labeler: &ClusterLabeler) -> Result<Self> {
        let mut hierarchy = Self::new(leaf_ids.to_vec(), true);
        for &k in counts {
            hierarchy.insert(AggregationLevel::from_merge_tree(tree, k, leaf_ids, labeler)?);
        }
        Ok(hierarchy)
    }

    pub fn insert(&mut self, level: AggregationLevel) {
        self.levels.insert(level.k, level);
    }

    pub fn leaf_ids(&self) -> &[String] {
        &self.leaf_ids
    }

    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// The level with `k` clusters
    pub fn level(&self, k: usize) -> Result<&AggregationLevel> {
        if k == 0 || k > self.leaf_ids.len() {
            return Err(AggregationError::InvalidClusterCount {
                requested: k,
                regions: self.leaf_ids.len(),
            });
        }
        self.levels.get(&k).ok_or(AggregationError::LevelNotComputed(k))
    }

    /// Levels from finest to coarsest
    pub fn levels(&self) -> impl Iterator<Item = &AggregationLevel> {
        self.levels.values().rev()
    }

    pub fn cluster_counts(&self) -> Vec<usize> {
        self.levels.keys().rev().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Partition invariant on every level
    pub fn check_partition(&self) -> bool {
        self.levels
            .values()
            .all(|level| level.is_partition_of(&self.leaf_ids))
    }

    /// Between consecutive computed levels k and k-1, every coarse cluster is
    /// either present unchanged or the union of exactly two finer clusters.
    pub fn check_nesting(&self) -> bool {
        self.levels.iter().tuple_windows().all(|((&k_low, coarse), (&k_high, fine))| {
            if k_high != k_low + 1 {
                return true;
            }
            let fine_sets: Vec<HashSet<&str>> = fine
                .clusters()
                .iter()
                .map(|c| c.members.iter().map(String::as_str).collect())
                .collect();

            coarse.clusters().iter().all(|cluster| {
                let members: HashSet<&str> = cluster.members.iter().map(String::as_str).collect();
                let parts: Vec<&HashSet<&str>> = fine_sets.iter().filter(|s| s.is_subset(&members)).collect();
                let covered: usize = parts.iter().map(|s| s.len()).sum();
                covered == members.len() && (parts.len() == 1 || parts.len() == 2)
            })
        })
    }

    /// k -> cluster id -> member ids
    pub fn to_mapping(&self) -> BTreeMap<usize, BTreeMap<String, Vec<String>>> {
        self.levels.iter().map(|(&k, level)| (k, level.to_map())).collect()
    }
}
