//! Union-Find over leaf indices

/// Disjoint sets with path compression and union by size
pub struct DisjointSets {
    /// Parent pointers (parent[i] = parent of leaf i)
    parent: Vec<usize>,

    /// Size of each set, valid at roots
    size: Vec<usize>,
}

impl DisjointSets {
    /// Create `n` singleton sets
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    /// Find the root of the set containing x with path compression
    pub fn find(&mut self, x: usize) -> usize {
        let px = self.parent[x];
        if px != x {
            self.parent[x] = self.find(px);
        }
        self.parent[x]
    }

    /// Union the sets containing x and y
    pub fn union(&mut self, x: usize, y: usize) {
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x == root_y {
            return;
        }

        if self.size[root_x] >= self.size[root_y] {
            self.parent[root_y] = root_x;
            self.size[root_x] += self.size[root_y];
        } else {
            self.parent[root_x] = root_y;
            self.size[root_y] += self.size[root_x];
        }
    }

    pub fn size(&mut self, x: usize) -> usize {
        let root = self.find(x);
        self.size[root]
    }

    /// Dense labels numbered by first appearance in index order
    pub fn labels(&mut self) -> Vec<usize> {
        let n = self.parent.len();
        let mut root_label = vec![usize::MAX; n];
        let mut next = 0;
        (0..n)
            .map(|i| {
                let root = self.find(i);
                if root_label[root] == usize::MAX {
                    root_label[root] = next;
                    next += 1;
                }
                root_label[root]
            })
            .collect()
    }
}
