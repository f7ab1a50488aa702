// Pearson correlation between every pair of table columns.

use anyhow::Result;
use serde::Serialize;

use super::special::student_t_two_sided;
use super::mean;
use crate::table::ResultsTable;

/// Correlation matrix with per-pair two-sided p-values.
///
/// Entries involving a constant column are NaN (correlation undefined).
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub r: Vec<Vec<f64>>,
    pub p_values: Vec<Vec<f64>>,
    pub n: usize,
}

impl CorrelationMatrix {
    /// (r, p) for two named columns.
    pub fn get(&self, a: &str, b: &str) -> Option<(f64, f64)> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some((self.r[i][j], self.p_values[i][j]))
    }
}

/// Pearson r between two equal-length samples. NaN if either is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    let denom = (sxx * syy).sqrt();
    if denom < f64::EPSILON {
        f64::NAN
    } else {
        (sxy / denom).clamp(-1.0, 1.0)
    }
}

/// Two-sided p-value for H0: rho = 0, using t = r sqrt((n-2)/(1-r^2)).
pub fn pearson_p_value(r: f64, n: usize) -> f64 {
    if r.is_nan() || n < 3 {
        return f64::NAN;
    }
    if (1.0 - r.abs()) < 1e-15 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    student_t_two_sided(t, df)
}

/// Pearson correlation matrix over every column of the table.
pub fn correlation_matrix(table: &ResultsTable) -> Result<CorrelationMatrix> {
    if table.column_count() < 2 {
        anyhow::bail!(
            "Correlation needs at least 2 columns, got {}",
            table.column_count()
        );
    }
    let n = table.row_count();
    if n < 3 {
        anyhow::bail!("Correlation needs at least 3 rows, got {n}");
    }

    let k = table.column_count();
    let cols = table.columns();
    let mut r = vec![vec![0.0; k]; k];
    let mut p = vec![vec![0.0; k]; k];

    for i in 0..k {
        for j in i..k {
            let (rij, pij) = if i == j {
                let constant = pearson(&cols[i].values, &cols[i].values).is_nan();
                if constant {
                    (f64::NAN, f64::NAN)
                } else {
                    (1.0, 0.0)
                }
            } else {
                let rij = pearson(&cols[i].values, &cols[j].values);
                (rij, pearson_p_value(rij, n))
            };
            r[i][j] = rij;
            r[j][i] = rij;
            p[i][j] = pij;
            p[j][i] = pij;
        }
    }

    Ok(CorrelationMatrix {
        columns: table.column_names().iter().map(|s| s.to_string()).collect(),
        r,
        p_values: p,
        n,
    })
}
