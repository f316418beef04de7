//! Agglomerative merging into an explicit merge tree.
//!
//! Node indices `0..n` are the leaf regions in input order; the node created
//! by merge step `s` gets index `n + s`. Candidate pairs live in a min-heap
//! and entries that reference an already merged node are discarded when
//! popped, so no entry is ever updated in place.
//!
//! Ties on distance are broken by the pair of node indices `(lower, higher)`,
//! smallest first. This is the only ordering rule and it fixes the output.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::cluster::disjoint::DisjointSets;
use crate::config::Linkage;
use crate::distance::DistanceMatrix;
use crate::error::{AggregationError, Result};

/// One merge step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeNode {
    /// Lower node index of the merged pair
    pub left: usize,
    /// Higher node index of the merged pair
    pub right: usize,
    /// Linkage distance at which the pair merged
    pub distance: f64,
    /// Number of leaves below this node
    pub size: usize,
    /// Cluster count right after this merge
    pub level: usize,
}

/// Complete merge history over `leaves` regions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeTree {
    leaves: usize,
    merges: Vec<MergeNode>,
}

impl MergeTree {
    pub fn leaf_count(&self) -> usize {
        self.leaves
    }

    /// Merges in the order they happened
    pub fn merges(&self) -> &[MergeNode] {
        &self.merges
    }

    /// Total number of nodes, leaves included
    pub fn node_count(&self) -> usize {
        self.leaves + self.merges.len()
    }

    pub fn is_leaf(&self, node: usize) -> bool {
        node < self.leaves
    }

    /// Children of a merged node
    pub fn children(&self, node: usize) -> Option<(usize, usize)> {
        if self.is_leaf(node) {
            return None;
        }
        self.merges.get(node - self.leaves).map(|m| (m.left, m.right))
    }

    /// Leaf indices below `node`, left subtree first
    pub fn members(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match self.children(current) {
                Some((left, right)) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => out.push(current),
            }
        }
        out
    }

    /// Nodes active when the tree is cut at `k` clusters, ascending.
    ///
    /// The first `n - k` merges are applied; every node they create or leave
    /// untouched and that is not consumed by a later applied merge is active.
    pub fn cut(&self, k: usize) -> Result<Vec<usize>> {
        self.check_level(k)?;
        let applied = self.leaves - k;
        let mut consumed = vec![false; self.leaves + applied];
        for merge in &self.merges[..applied] {
            consumed[merge.left] = true;
            consumed[merge.right] = true;
        }
        Ok((0..self.leaves + applied).filter(|&node| !consumed[node]).collect())
    }

    /// Per-leaf cluster labels at `k`, numbered by first appearance
    pub fn labels(&self, k: usize) -> Result<Vec<usize>> {
        self.check_level(k)?;
        let mut sets = DisjointSets::new(self.leaves);
        let mut representative: Vec<usize> = (0..self.leaves).collect();
        for merge in &self.merges[..self.leaves - k] {
            let (a, b) = (representative[merge.left], representative[merge.right]);
            sets.union(a, b);
            representative.push(a);
        }
        Ok(sets.labels())
    }

    fn check_level(&self, k: usize) -> Result<()> {
        if k == 0 || k > self.leaves {
            return Err(AggregationError::InvalidClusterCount {
                requested: k,
                regions: self.leaves,
            });
        }
        Ok(())
    }
}

/// Heap entry; ordered by distance, then by node pair
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    a: usize,
    b: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.a.cmp(&other.a))
            .then(self.b.cmp(&other.b))
    }
}

impl Linkage {
    /// Lance-Williams update: distance from `c` to the union of `a` and `b`
    pub fn update(&self, d_ca: f64, d_cb: f64, d_ab: f64, size_a: usize, size_b: usize) -> f64 {
        let (na, nb) = (size_a as f64, size_b as f64);
        match self {
            Linkage::Single => d_ca.min(d_cb),
            Linkage::Complete => d_ca.max(d_cb),
            Linkage::Average => (na * d_ca + nb * d_cb) / (na + nb),
            Linkage::Centroid => {
                let total = na + nb;
                let squared = (na * d_ca * d_ca + nb * d_cb * d_cb) / total
                    - na * nb * d_ab * d_ab / (total * total);
                squared.max(0.0).sqrt()
            }
        }
    }
}

/// Repeated minimum-distance merging over a distance matrix
pub struct HierarchicalAggregator {
    linkage: Linkage,
}

impl HierarchicalAggregator {
    pub fn new(linkage: Linkage) -> Self {
        Self { linkage }
    }

    /// Run all `n - 1` merges
    pub fn build(&self, distances: &DistanceMatrix) -> MergeTree {
        let n = distances.len();
        let total = if n == 0 { 0 } else { 2 * n - 1 };
        log::info!("Agglomerating {} regions with {} linkage", n, self.linkage);

        // Working distances are stored per slot; a merged node reuses the
        // slot of its lower child.
        let mut working = distances.as_array().clone();
        let mut slot_of = vec![usize::MAX; total];
        let mut size = vec![0usize; total];
        let mut alive = vec![false; total];
        for leaf in 0..n {
            slot_of[leaf] = leaf;
            size[leaf] = 1;
            alive[leaf] = true;
        }
        let mut active: Vec<usize> = (0..n).collect();

        let mut heap = BinaryHeap::with_capacity(n * n.saturating_sub(1) / 2);
        for a in 0..n {
            for b in a + 1..n {
                heap.push(Reverse(Candidate {
                    distance: working[[a, b]],
                    a,
                    b,
                }));
            }
        }

        let mut merges = Vec::with_capacity(n.saturating_sub(1));
        while merges.len() + 1 < n {
            let Some(Reverse(best)) = heap.pop() else {
                break;
            };
            if !alive[best.a] || !alive[best.b] {
                continue;
            }

            let node = n + merges.len();
            let (a, b) = (best.a, best.b);
            let (slot_a, slot_b) = (slot_of[a], slot_of[b]);

            alive[a] = false;
            alive[b] = false;
            active.retain(|&c| c != a && c != b);

            for &c in &active {
                let slot_c = slot_of[c];
                let d = self.linkage.update(
                    working[[slot_c, slot_a]],
                    working[[slot_c, slot_b]],
                    best.distance,
                    size[a],
                    size[b],
                );
                working[[slot_c, slot_a]] = d;
                working[[slot_a, slot_c]] = d;
                heap.push(Reverse(Candidate { distance: d, a: c, b: node }));
            }

            slot_of[node] = slot_a;
            size[node] = size[a] + size[b];
            alive[node] = true;
            active.push(node);

            log::debug!(
                "merge {}: nodes {} + {} -> {} at {:.6} (size {})",
                merges.len(),
                a,
                b,
                node,
                best.distance,
                size[node]
            );

            merges.push(MergeNode {
                left: a,
                right: b,
                distance: best.distance,
                size: size[node],
                level: n - merges.len() - 1,
            });
        }

        MergeTree { leaves: n, merges }
    }
}
