// Agglomerative hierarchical clustering of table rows.
//
// Produces scipy-style linkage rows: leaves are 0..n, the cluster created by
// merge i gets id n + i. Distances between clusters are updated with the
// Lance-Williams recurrence for the chosen linkage.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::table::ResultsTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Ward,
    Average,
    Complete,
    Single,
}

impl Linkage {
    pub const ALL: [Linkage; 4] = [Self::Ward, Self::Average, Self::Complete, Self::Single];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ward => "ward",
            Self::Average => "average",
            Self::Complete => "complete",
            Self::Single => "single",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|l| l.name() == name)
    }

    /// Distance from cluster v to the union of clusters s and t.
    fn update(&self, d_vs: f64, d_vt: f64, d_st: f64, n_v: f64, n_s: f64, n_t: f64) -> f64 {
        match self {
            Self::Single => d_vs.min(d_vt),
            Self::Complete => d_vs.max(d_vt),
            Self::Average => (n_s * d_vs + n_t * d_vt) / (n_s + n_t),
            Self::Ward => {
                let total = n_v + n_s + n_t;
                let sum = (n_v + n_s) * d_vs * d_vs + (n_v + n_t) * d_vt * d_vt
                    - n_v * d_st * d_st;
                (sum / total).max(0.0).sqrt()
            }
        }
    }
}

impl std::fmt::Display for Linkage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    /// Leaves under the new cluster
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dendrogram {
    pub linkage: Linkage,
    pub n_leaves: usize,
    pub merges: Vec<Merge>,
}

/// Cluster the rows of the table.
pub fn linkage(table: &ResultsTable, method: Linkage) -> Result<Dendrogram> {
    let points: Vec<Vec<f64>> = (0..table.row_count()).map(|i| table.row(i)).collect();
    linkage_points(&points, method)
}

/// Cluster arbitrary points under Euclidean distance.
pub fn linkage_points(points: &[Vec<f64>], method: Linkage) -> Result<Dendrogram> {
    let n = points.len();
    if n < 2 {
        anyhow::bail!("Hierarchical clustering needs at least 2 rows, got {n}");
    }

    let mut dist = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    // Slot i holds the cluster currently stored at matrix index i
    let mut ids: Vec<usize> = (0..n).collect();
    let mut sizes: Vec<usize> = vec![1; n];
    let mut active: Vec<bool> = vec![true; n];
    let mut merges = Vec::with_capacity(n - 1);

    for step in 0..(n - 1) {
        let mut best = (usize::MAX, usize::MAX, f64::INFINITY);
        for i in (0..n).filter(|&i| active[i]) {
            for j in ((i + 1)..n).filter(|&j| active[j]) {
                if dist[i][j] < best.2 {
                    best = (i, j, dist[i][j]);
                }
            }
        }
        let (s, t, d_st) = best;
        if s == usize::MAX {
            anyhow::bail!("Hierarchical clustering failed: non-finite distances");
        }

        let (n_s, n_t) = (sizes[s] as f64, sizes[t] as f64);
        for v in (0..n).filter(|&v| active[v] && v != s && v != t) {
            let d = method.update(dist[v][s], dist[v][t], d_st, sizes[v] as f64, n_s, n_t);
            dist[v][s] = d;
            dist[s][v] = d;
        }

        merges.push(Merge {
            left: ids[s].min(ids[t]),
            right: ids[s].max(ids[t]),
            distance: d_st,
            size: sizes[s] + sizes[t],
        });

        // The merged cluster takes slot s
        ids[s] = n + step;
        sizes[s] += sizes[t];
        active[t] = false;
    }

    Ok(Dendrogram {
        linkage: method,
        n_leaves: n,
        merges,
    })
}

impl Dendrogram {
    /// Flat cluster labels (0-based, numbered by first leaf) with exactly k clusters.
    pub fn cut(&self, k: usize) -> Result<Vec<usize>> {
        let n = self.n_leaves;
        if k == 0 || k > n {
            anyhow::bail!("Cannot cut {n} leaves into {k} clusters");
        }

        // Union-find over leaves and internal nodes
        let mut parent: Vec<usize> = (0..(2 * n - 1)).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for (i, m) in self.merges.iter().take(n - k).enumerate() {
            let node = n + i;
            let l = find(&mut parent, m.left);
            let r = find(&mut parent, m.right);
            parent[l] = node;
            parent[r] = node;
        }

        let mut roots: Vec<usize> = Vec::new();
        let mut labels = Vec::with_capacity(n);
        for leaf in 0..n {
            let root = find(&mut parent, leaf);
            let label = match roots.iter().position(|&r| r == root) {
                Some(p) => p,
                None => {
                    roots.push(root);
                    roots.len() - 1
                }
            };
            labels.push(label);
        }
        Ok(labels)
    }

    /// Leaves in left-to-right plotting order.
    pub fn leaf_order(&self) -> Vec<usize> {
        let n = self.n_leaves;
        let Some(root) = self.merges.len().checked_sub(1).map(|i| n + i) else {
            return (0..n).collect();
        };

        let mut order = Vec::with_capacity(n);
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node < n {
                order.push(node);
            } else {
                let m = &self.merges[node - n];
                stack.push(m.right);
                stack.push(m.left);
            }
        }
        order
    }

    /// Height of the final merge.
    pub fn height(&self) -> f64 {
        self.merges.last().map(|m| m.distance).unwrap_or(0.0)
    }
}
