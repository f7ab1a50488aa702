// K-means clustering of table rows with k-means++ seeding.
//
// Seeding draws from a StdRng built from an explicit seed, so the same table
// and seed always produce the same assignment.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::table::ResultsTable;

pub const DEFAULT_MAX_ITER: usize = 300;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Serialize)]
pub struct ClusterAssignment {
    pub columns: Vec<String>,
    pub n: usize,
    pub k: usize,
    /// Cluster index per table row
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl ClusterAssignment {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &l in &self.labels {
            sizes[l] += 1;
        }
        sizes
    }
}

pub fn kmeans(
    table: &ResultsTable,
    k: usize,
    max_iter: usize,
    seed: u64,
) -> Result<ClusterAssignment> {
    let n = table.row_count();
    if k == 0 {
        anyhow::bail!("k-means needs k >= 1");
    }
    if k > n {
        anyhow::bail!("k-means requested {k} clusters but the table has only {n} rows");
    }
    if max_iter == 0 {
        anyhow::bail!("k-means needs max_iter >= 1");
    }

    let points: Vec<Vec<f64>> = (0..n).map(|i| table.row(i)).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = seed_plus_plus(&points, k, &mut rng);
    let mut labels = vec![0usize; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iter {
        iterations += 1;

        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let best = nearest(p, &centroids).0;
            if best != labels[i] {
                labels[i] = best;
                changed = true;
            }
        }

        let updated = recompute_centroids(&points, &labels, &centroids);
        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = updated;

        if !changed && shift < 1e-18 {
            converged = true;
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| squared_distance(p, &centroids[l]))
        .sum();

    debug!(k, iterations, converged, inertia, "k-means finished");

    Ok(ClusterAssignment {
        columns: table.column_names().iter().map(|s| s.to_string()).collect(),
        n,
        k,
        labels,
        centroids,
        inertia,
        iterations,
        converged,
    })
}

/// k-means++: first centroid uniform, then each next one drawn with
/// probability proportional to squared distance from the nearest chosen one.
fn seed_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = vec![points[rng.random_range(0..points.len())].clone()];

    while centroids.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centroids).1).collect();
        let total: f64 = weights.iter().sum();

        let next = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        } else {
            // Every point coincides with a centroid; duplicates are unavoidable
            rng.random_range(0..points.len())
        };
        centroids.push(points[next].clone());
    }
    centroids
}

fn recompute_centroids(
    points: &[Vec<f64>],
    labels: &[usize],
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let dim = points[0].len();
    let mut sums = vec![vec![0.0; dim]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (p, &l) in points.iter().zip(labels) {
        counts[l] += 1;
        for (s, v) in sums[l].iter_mut().zip(p) {
            *s += v;
        }
    }
    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((s, c), prev)| {
            if c == 0 {
                // Empty cluster keeps its last position
                prev.clone()
            } else {
                s.into_iter().map(|v| v / c as f64).collect()
            }
        })
        .collect()
}

/// (index, squared distance) of the closest centroid.
fn nearest(p: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(p, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn two_blobs() -> ResultsTable {
        ResultsTable::new(vec![
            Column {
                name: "x".to_string(),
                values: vec![0.0, 0.1, 0.2, 5.0, 5.1, 5.2],
            },
            Column {
                name: "y".to_string(),
                values: vec![0.0, 0.1, 0.0, 5.0, 5.1, 5.0],
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_separates_two_blobs() {
        let r = kmeans(&two_blobs(), 2, 100, 42).unwrap();
        assert!(r.converged);
        assert_eq!(r.labels[0], r.labels[1]);
        assert_eq!(r.labels[1], r.labels[2]);
        assert_eq!(r.labels[3], r.labels[4]);
        assert_ne!(r.labels[0], r.labels[3]);
        assert_eq!(r.cluster_sizes().iter().sum::<usize>(), 6);
        assert!(r.inertia < 0.2, "inertia {}", r.inertia);
    }

    #[test]
    fn test_same_seed_same_result() {
        let t = two_blobs();
        let a = kmeans(&t, 3, 100, 7).unwrap();
        let b = kmeans(&t, 3, 100, 7).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn test_k_equals_n_has_zero_inertia() {
        let r = kmeans(&two_blobs(), 6, 100, 1).unwrap();
        assert!(r.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_invalid_k_fails() {
        assert!(kmeans(&two_blobs(), 0, 100, 1).is_err());
        assert!(kmeans(&two_blobs(), 7, 100, 1).is_err());
    }

    #[test]
    fn test_iteration_cap_is_respected() {
        let r = kmeans(&two_blobs(), 2, 1, 42).unwrap();
        assert_eq!(r.iterations, 1);
    }
}
