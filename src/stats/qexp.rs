// Q-exponential curve fit: y = a * [1 - (1 - q) b x]^(1 / (1 - q)).
//
// As q -> 1 the curve becomes a * exp(-b x). Parameters are estimated by
// Levenberg-Marquardt with a finite-difference Jacobian, restarted from
// several initial q values; the lowest-SSE converged run wins. q is kept
// below `MAX_Q`: steps that would cross it are damped like any rejected
// step. A fit that does not converge is reported as `QExpFit::Failed`,
// never as a panic.

use anyhow::Result;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::debug;

use super::mean;
use crate::table::ResultsTable;

pub const DEFAULT_MAX_ITER: usize = 500;
const INITIAL_Q: [f64; 4] = [0.5, 0.9, 1.1, 1.5];
const Q_ONE_TOL: f64 = 1e-9;
/// Stop when an accepted step lowers the SSE by less than this fraction.
const FTOL: f64 = 1.5e-8;
/// Stop when every parameter moves by less than this fraction of itself.
const XTOL: f64 = 1.5e-8;
const GTOL: f64 = 1e-12;
/// Upper bound on q. Past it the curve degenerates along b -> 0, q -> inf.
pub const MAX_Q: f64 = 3.0;
const MAX_LAMBDA: f64 = 1e12;
const PERFECT_FIT: f64 = 1e-24;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "fit", rename_all = "snake_case")]
pub enum QExpFit {
    Converged {
        a: f64,
        b: f64,
        q: f64,
        sse: f64,
        r_squared: f64,
        iterations: usize,
    },
    Failed {
        reason: String,
        /// (a, b, q) the first attempt started from
        initial: (f64, f64, f64),
    },
}

impl QExpFit {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    /// (a, b, q) of a converged fit.
    pub fn params(&self) -> Option<(f64, f64, f64)> {
        match self {
            Self::Converged { a, b, q, .. } => Some((*a, *b, *q)),
            Self::Failed { .. } => None,
        }
    }
}

/// A fit together with what it was fitted on.
#[derive(Debug, Clone, Serialize)]
pub struct QExpResult {
    pub column: String,
    /// Covariate column, or None when x is the row index
    pub covariate: Option<String>,
    pub n: usize,
    #[serde(flatten)]
    pub fit: QExpFit,
}

/// Evaluate the q-exponential at x.
///
/// A non-positive base yields 0 when the exponent is positive (the curve has
/// reached its cutoff) and a non-finite value otherwise.
pub fn q_exponential(x: f64, a: f64, b: f64, q: f64) -> f64 {
    let one_minus_q = 1.0 - q;
    if one_minus_q.abs() < Q_ONE_TOL {
        return a * (-b * x).exp();
    }
    let base = 1.0 - one_minus_q * b * x;
    let exponent = 1.0 / one_minus_q;
    if base <= 0.0 {
        if exponent > 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        a * base.powf(exponent)
    }
}

/// Fit a column of the table. x is the row index unless `covariate` names
/// another column.
pub fn fit_column(
    table: &ResultsTable,
    column: &str,
    covariate: Option<&str>,
    max_iter: usize,
) -> Result<QExpResult> {
    let y = table.require_column(column)?;
    let x: Vec<f64> = match covariate {
        Some(name) => table.require_column(name)?.to_vec(),
        None => (0..y.len()).map(|i| i as f64).collect(),
    };
    Ok(QExpResult {
        column: column.to_string(),
        covariate: covariate.map(str::to_string),
        n: y.len(),
        fit: fit_qexp(&x, y, max_iter),
    })
}

/// Fit (a, b, q) to the points, trying each initial q in turn.
pub fn fit_qexp(x: &[f64], y: &[f64], max_iter: usize) -> QExpFit {
    let (a0, b0) = initial_guess(x, y);
    let initial = (a0, b0, INITIAL_Q[0]);

    if x.len() != y.len() {
        return QExpFit::Failed {
            reason: format!("x has {} values but y has {}", x.len(), y.len()),
            initial,
        };
    }
    if y.len() < 4 {
        return QExpFit::Failed {
            reason: format!("need at least 4 points to fit 3 parameters, got {}", y.len()),
            initial,
        };
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return QExpFit::Failed {
            reason: "input contains non-finite values".to_string(),
            initial,
        };
    }
    if y.iter().all(|v| (v - y[0]).abs() <= f64::EPSILON * y[0].abs().max(1.0)) {
        return QExpFit::Failed {
            reason: "y is constant, so b and q are not identifiable".to_string(),
            initial,
        };
    }

    let mut best: Option<QExpFit> = None;
    let mut last_reason = String::from("no start converged");
    for q0 in INITIAL_Q {
        match levenberg_marquardt(x, y, [a0, b0, q0], max_iter) {
            Ok(fit) => {
                debug!(q0, ?fit, "q-exponential start converged");
                let better = match (&best, &fit) {
                    (
                        Some(QExpFit::Converged { sse: old, .. }),
                        QExpFit::Converged { sse, .. },
                    ) => sse < old,
                    _ => true,
                };
                if better {
                    best = Some(fit);
                }
            }
            Err(reason) => {
                debug!(q0, %reason, "q-exponential start failed");
                last_reason = reason;
            }
        }
    }

    best.unwrap_or(QExpFit::Failed {
        reason: last_reason,
        initial,
    })
}

/// a0 from the first point, b0 from the slope of log|y| against x.
fn initial_guess(x: &[f64], y: &[f64]) -> (f64, f64) {
    let a0 = match y.first() {
        Some(&v) if v != 0.0 && v.is_finite() => v,
        _ => y
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(1.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc }),
    };

    let logs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(_, v)| v.abs() > 0.0 && v.is_finite())
        .map(|(&xi, v)| (xi, v.abs().ln()))
        .collect();
    let b0 = if logs.len() >= 2 {
        let xs: Vec<f64> = logs.iter().map(|p| p.0).collect();
        let ls: Vec<f64> = logs.iter().map(|p| p.1).collect();
        let (mx, ml) = (mean(&xs), mean(&ls));
        let sxx: f64 = xs.iter().map(|v| (v - mx).powi(2)).sum();
        let sxl: f64 = xs.iter().zip(&ls).map(|(a, b)| (a - mx) * (b - ml)).sum();
        -sxl / sxx
    } else {
        f64::NAN
    };

    let b0 = if b0.is_finite() && b0 != 0.0 { b0 } else { 0.1 };
    (a0, b0)
}

fn sse_of(x: &[f64], y: &[f64], p: &[f64; 3]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| (yi - q_exponential(xi, p[0], p[1], p[2])).powi(2))
        .sum()
}

fn levenberg_marquardt(
    x: &[f64],
    y: &[f64],
    start: [f64; 3],
    max_iter: usize,
) -> Result<QExpFit, String> {
    let n = x.len();
    let mut params = start;
    let mut sse = sse_of(x, y, &params);
    if !sse.is_finite() {
        return Err(format!("model is non-finite at the initial guess {start:?}"));
    }
    let mut lambda = 1e-3;

    for iteration in 1..=max_iter {
        let residuals = DVector::from_iterator(
            n,
            x.iter()
                .zip(y)
                .map(|(&xi, &yi)| yi - q_exponential(xi, params[0], params[1], params[2])),
        );
        let jac = jacobian(x, &params);
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let gradient = &jt * &residuals;

        if gradient.amax() < GTOL {
            return Ok(converged(y, params, sse, iteration));
        }

        // Raise lambda until a step lowers the SSE
        loop {
            let mut damped = jtj.clone();
            for j in 0..3 {
                damped[(j, j)] += lambda * jtj[(j, j)].max(1e-12);
            }
            let step = damped.lu().solve(&gradient);

            if let Some(step) = step.filter(|s| s.iter().all(|v| v.is_finite())) {
                let candidate = [params[0] + step[0], params[1] + step[1], params[2] + step[2]];
                let candidate_sse = if candidate[2] < MAX_Q {
                    sse_of(x, y, &candidate)
                } else {
                    f64::INFINITY
                };

                if candidate_sse.is_finite() && candidate_sse < sse {
                    let improvement = sse - candidate_sse;
                    let small_step = (0..3)
                        .all(|j| step[j].abs() <= XTOL * (candidate[j].abs() + XTOL));
                    let previous = sse;
                    params = candidate;
                    sse = candidate_sse;
                    lambda = (lambda / 10.0).max(1e-15);

                    if sse <= PERFECT_FIT || improvement <= FTOL * previous || small_step {
                        return Ok(converged(y, params, sse, iteration));
                    }
                    break;
                }
            }

            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                // No descent direction left: a stationary point
                return Ok(converged(y, params, sse, iteration));
            }
        }
    }

    Err(format!("did not converge within {max_iter} iterations"))
}

fn converged(y: &[f64], p: [f64; 3], sse: f64, iterations: usize) -> QExpFit {
    let m = mean(y);
    let sst: f64 = y.iter().map(|v| (v - m).powi(2)).sum();
    let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { f64::NAN };
    QExpFit::Converged {
        a: p[0],
        b: p[1],
        q: p[2],
        sse,
        r_squared,
        iterations,
    }
}

/// Central-difference Jacobian of the model with respect to (a, b, q).
fn jacobian(x: &[f64], p: &[f64; 3]) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(x.len(), 3);
    for j in 0..3 {
        let h = 1e-6 * p[j].abs().max(1e-3);
        let mut hi = *p;
        let mut lo = *p;
        hi[j] += h;
        lo[j] -= h;
        for (i, &xi) in x.iter().enumerate() {
            let d = (q_exponential(xi, hi[0], hi[1], hi[2])
                - q_exponential(xi, lo[0], lo[1], lo[2]))
                / (2.0 * h);
            jac[(i, j)] = if d.is_finite() { d } else { 0.0 };
        }
    }
    jac
}
