// Ordinary least squares: simple and multiple linear regression.
//
// Solves the normal equations (X'X) b = X'y with an intercept column and
// reports the usual fit statistics. Multiple regression also reports the
// variance inflation factor of each predictor as a multicollinearity check.

use anyhow::Result;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use super::special::{f_survival, student_t_two_sided};
use super::variance;
use crate::table::ResultsTable;

/// Name used for the intercept coefficient.
pub const INTERCEPT: &str = "(intercept)";

#[derive(Debug, Clone, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_statistic: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionResult {
    pub response: String,
    pub predictors: Vec<String>,
    pub n: usize,
    /// Intercept first, then one per predictor
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub residual_std_error: f64,
    pub predictions: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Variance inflation factor per predictor (1.0 with a single predictor)
    pub vif: Vec<f64>,
}

impl RegressionResult {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Slope of a simple regression (first predictor).
    pub fn slope(&self) -> Option<f64> {
        self.coefficients.get(1).map(|c| c.estimate)
    }

    pub fn intercept(&self) -> f64 {
        self.coefficients[0].estimate
    }
}

/// One predictor column against one response column.
pub fn linear_regression(
    table: &ResultsTable,
    predictor: &str,
    response: &str,
) -> Result<RegressionResult> {
    multiple_regression(table, &[predictor], response)
}

/// Several predictor columns against one response column.
pub fn multiple_regression(
    table: &ResultsTable,
    predictors: &[&str],
    response: &str,
) -> Result<RegressionResult> {
    let y = table.require_column(response)?;
    let xs = predictors
        .iter()
        .map(|&p| table.require_column(p).map(|v| (p, v)))
        .collect::<Result<Vec<_>>>()?;
    ols(&xs, (response, y))
}

/// Fit y on the given predictors with an intercept.
pub fn ols(predictors: &[(&str, &[f64])], response: (&str, &[f64])) -> Result<RegressionResult> {
    let (response_name, y) = response;
    let n = y.len();
    let p = predictors.len();

    if p == 0 {
        anyhow::bail!("Regression needs at least one predictor");
    }
    if predictors.iter().any(|(name, _)| *name == response_name) {
        anyhow::bail!("Column '{response_name}' cannot be both predictor and response");
    }
    if n < p + 2 {
        anyhow::bail!(
            "Regression with {p} predictor(s) needs at least {} rows, got {n}",
            p + 2
        );
    }
    for (name, values) in predictors {
        if values.len() != n {
            anyhow::bail!("Predictor '{name}' has {} rows, response has {n}", values.len());
        }
        if !(variance(values) > f64::EPSILON) {
            anyhow::bail!("Predictor '{name}' has zero variance");
        }
    }
    if !(variance(y) > f64::EPSILON) {
        anyhow::bail!("Response '{response_name}' has zero variance");
    }

    let x = design_matrix(predictors, n);
    let yv = DVector::from_column_slice(y);
    let (beta, xtx_inv) = solve_normal_equations(&x, &yv).ok_or_else(|| {
        anyhow::anyhow!("Predictors are perfectly collinear; X'X is singular")
    })?;

    let fitted = &x * &beta;
    let residuals = &yv - &fitted;
    let y_mean = yv.mean();
    let sse: f64 = residuals.iter().map(|r| r * r).sum();
    let sst: f64 = yv.iter().map(|v| (v - y_mean).powi(2)).sum();

    let df_model = p as f64;
    let df_resid = (n - p - 1) as f64;
    let r_squared = 1.0 - sse / sst;
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / df_resid;
    let sigma2 = sse / df_resid;

    let names = std::iter::once(INTERCEPT).chain(predictors.iter().map(|(n, _)| *n));
    let coefficients = names
        .enumerate()
        .map(|(j, name)| {
            let estimate = beta[j];
            let std_error = (sigma2 * xtx_inv[(j, j)]).max(0.0).sqrt();
            let t_statistic = if std_error > 0.0 {
                estimate / std_error
            } else {
                f64::INFINITY.copysign(estimate)
            };
            Coefficient {
                name: name.to_string(),
                estimate,
                std_error,
                t_statistic,
                p_value: student_t_two_sided(t_statistic, df_resid),
            }
        })
        .collect();

    let f_statistic = if sse > 0.0 {
        ((sst - sse) / df_model) / sigma2
    } else {
        f64::INFINITY
    };

    Ok(RegressionResult {
        response: response_name.to_string(),
        predictors: predictors.iter().map(|(n, _)| n.to_string()).collect(),
        n,
        coefficients,
        r_squared,
        adj_r_squared,
        f_statistic,
        f_p_value: f_survival(f_statistic, df_model, df_resid),
        residual_std_error: sigma2.sqrt(),
        predictions: fitted.iter().copied().collect(),
        residuals: residuals.iter().copied().collect(),
        vif: variance_inflation(predictors),
    })
}

/// [1 | x1 | x2 | ...] with one row per observation.
fn design_matrix(predictors: &[(&str, &[f64])], n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, predictors.len() + 1, |i, j| {
        if j == 0 {
            1.0
        } else {
            predictors[j - 1].1[i]
        }
    })
}

fn solve_normal_equations(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
) -> Option<(DVector<f64>, DMatrix<f64>)> {
    let xt = x.transpose();
    let xtx_inv = (&xt * x).try_inverse()?;
    let beta = &xtx_inv * (&xt * y);
    if beta.iter().all(|b| b.is_finite()) {
        Some((beta, xtx_inv))
    } else {
        None
    }
}

/// VIF_j = 1 / (1 - R^2_j), regressing predictor j on the others.
fn variance_inflation(predictors: &[(&str, &[f64])]) -> Vec<f64> {
    if predictors.len() < 2 {
        return vec![1.0; predictors.len()];
    }
    (0..predictors.len())
        .map(|j| {
            let others: Vec<(&str, &[f64])> = predictors
                .iter()
                .enumerate()
                .filter(|(k, _)| *k != j)
                .map(|(_, p)| *p)
                .collect();
            let target = predictors[j].1;
            let x = design_matrix(&others, target.len());
            let y = DVector::from_column_slice(target);
            match solve_normal_equations(&x, &y) {
                Some((beta, _)) => {
                    let resid = &y - &x * beta;
                    let sse: f64 = resid.iter().map(|r| r * r).sum();
                    let m = y.mean();
                    let sst: f64 = y.iter().map(|v| (v - m).powi(2)).sum();
                    let r2 = 1.0 - sse / sst;
                    if r2 >= 1.0 {
                        f64::INFINITY
                    } else {
                        1.0 / (1.0 - r2)
                    }
                }
                None => f64::INFINITY,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_line_is_recovered() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 0.5 + 2.0 * v).collect();
        let fit = ols(&[("x", &x)], ("y", &y)).unwrap();
        assert!((fit.intercept() - 0.5).abs() < 1e-10);
        assert!((fit.slope().unwrap() - 2.0).abs() < 1e-10);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(fit.vif, vec![1.0]);
    }

    #[test]
    fn test_noisy_fit_statistics() {
        // Textbook example: slope 0.6, intercept 2.2, R^2 = 0.6
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 5.0, 4.0, 5.0];
        let fit = ols(&[("x", &x)], ("y", &y)).unwrap();
        assert!((fit.slope().unwrap() - 0.6).abs() < 1e-10);
        assert!((fit.intercept() - 2.2).abs() < 1e-10);
        assert!((fit.r_squared - 0.6).abs() < 1e-10);
        // F = 4.5 on (1, 3) df
        assert!((fit.f_statistic - 4.5).abs() < 1e-9);
        let slope_p = fit.coefficient("x").unwrap().p_value;
        assert!((slope_p - fit.f_p_value).abs() < 1e-9, "t^2 = F for one predictor");
        let resid_sum: f64 = fit.residuals.iter().sum();
        assert!(resid_sum.abs() < 1e-10);
    }

    #[test]
    fn test_zero_variance_predictor_fails() {
        let err = ols(&[("k", &[1.0, 1.0, 1.0, 1.0])], ("y", &[1.0, 2.0, 3.0, 4.0]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("zero variance"), "got: {err}");
    }

    #[test]
    fn test_collinear_predictors_fail_or_inflate() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b: Vec<f64> = a.iter().map(|v| 2.0 * v).collect();
        let y = [1.0, 3.0, 2.0, 5.0, 4.0, 6.0];
        match ols(&[("a", &a), ("b", &b)], ("y", &y)) {
            Err(e) => assert!(e.to_string().contains("collinear")),
            Ok(fit) => assert!(fit.vif.iter().all(|v| *v > 1e6)),
        }
    }

    #[test]
    fn test_multiple_regression_recovers_plane() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let b = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0, 8.0];
        let y: Vec<f64> = a.iter().zip(&b).map(|(x1, x2)| 1.0 + 0.5 * x1 - 0.25 * x2).collect();
        let fit = ols(&[("a", &a), ("b", &b)], ("y", &y)).unwrap();
        assert!((fit.coefficient("a").unwrap().estimate - 0.5).abs() < 1e-9);
        assert!((fit.coefficient("b").unwrap().estimate + 0.25).abs() < 1e-9);
        assert_eq!(fit.vif.len(), 2);
        assert!(fit.vif.iter().all(|v| *v >= 1.0));
    }

    #[test]
    fn test_too_few_rows() {
        assert!(ols(&[("x", &[1.0, 2.0])], ("y", &[1.0, 2.0])).is_err());
    }
}
