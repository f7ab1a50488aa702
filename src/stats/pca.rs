// Principal component analysis via eigendecomposition of the covariance
// matrix of the centered table.

use anyhow::Result;
use nalgebra::{DMatrix, SymmetricEigen};
use serde::Serialize;
use tracing::debug;

use crate::table::ResultsTable;

#[derive(Debug, Clone, Serialize)]
pub struct PcaResult {
    pub columns: Vec<String>,
    pub n: usize,
    pub n_components: usize,
    /// loadings[c][j]: weight of column j in component c
    pub loadings: Vec<Vec<f64>>,
    /// scores[i][c]: row i projected onto component c
    pub scores: Vec<Vec<f64>>,
    pub explained_variance: Vec<f64>,
    /// Share of the total variance; sums to 1 when every component is kept
    pub explained_variance_ratio: Vec<f64>,
}

pub fn pca(table: &ResultsTable, n_components: usize) -> Result<PcaResult> {
    let p = table.column_count();
    let n = table.row_count();

    if n_components == 0 {
        anyhow::bail!("PCA needs at least 1 component");
    }
    if n_components > p {
        anyhow::bail!("PCA requested {n_components} components but the table has only {p} columns");
    }
    if n < 2 {
        anyhow::bail!("PCA needs at least 2 rows, got {n}");
    }

    let mut x = table.to_matrix();
    for j in 0..p {
        let m = x.column(j).mean();
        for i in 0..n {
            x[(i, j)] -= m;
        }
    }
    let cov: DMatrix<f64> = (x.transpose() * &x) / (n as f64 - 1.0);

    let eigen = SymmetricEigen::new(cov);
    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    // Tiny negative eigenvalues are rounding noise
    let eigenvalues: Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i].max(0.0)).collect();
    let total: f64 = eigenvalues.iter().sum();
    if !(total > f64::EPSILON) {
        anyhow::bail!("PCA is undefined: the table has zero total variance");
    }

    let loadings: Vec<Vec<f64>> = order
        .iter()
        .take(n_components)
        .map(|&i| {
            let mut v: Vec<f64> = eigen.eigenvectors.column(i).iter().copied().collect();
            // Sign convention: largest-magnitude loading is positive
            let pivot = v
                .iter()
                .copied()
                .fold(0.0_f64, |acc, w| if w.abs() > acc.abs() { w } else { acc });
            if pivot < 0.0 {
                v.iter_mut().for_each(|w| *w = -*w);
            }
            v
        })
        .collect();

    let scores: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            loadings
                .iter()
                .map(|l| l.iter().enumerate().map(|(j, w)| x[(i, j)] * w).sum())
                .collect()
        })
        .collect();

    let explained_variance: Vec<f64> = eigenvalues[..n_components].to_vec();
    let explained_variance_ratio: Vec<f64> = explained_variance.iter().map(|v| v / total).collect();

    debug!(
        components = n_components,
        ratio = explained_variance_ratio.iter().sum::<f64>(),
        "PCA complete"
    );

    Ok(PcaResult {
        columns: table.column_names().iter().map(|s| s.to_string()).collect(),
        n,
        n_components,
        loadings,
        scores,
        explained_variance,
        explained_variance_ratio,
    })
}
