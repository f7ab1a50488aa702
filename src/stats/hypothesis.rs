// Hypothesis tests: t tests and the Jarque-Bera normality test.
//
// Every outcome carries its alpha and the reject/retain decision, so a
// report never has to guess which significance level was applied.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::special::{chi_squared_survival, student_t_two_sided};
use super::{mean, require_len, variance};
use crate::table::ResultsTable;

pub const DEFAULT_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HypothesisTest {
    /// H0: the column mean equals `mu`
    OneSampleT { mu: f64 },
    /// H0: the mean difference between two columns is zero
    PairedT,
    /// H0: two columns have equal means (unequal variances allowed)
    WelchT,
    /// H0: the column is normally distributed
    JarqueBera,
}

impl HypothesisTest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OneSampleT { .. } => "One-sample t",
            Self::PairedT => "Paired t",
            Self::WelchT => "Welch t",
            Self::JarqueBera => "Jarque-Bera",
        }
    }

    /// Number of columns the test consumes.
    pub fn arity(&self) -> usize {
        match self {
            Self::OneSampleT { .. } | Self::JarqueBera => 1,
            Self::PairedT | Self::WelchT => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub test: HypothesisTest,
    pub columns: Vec<String>,
    pub n: usize,
    pub statistic: f64,
    pub df: f64,
    pub p_value: f64,
    pub alpha: f64,
    pub reject: bool,
}

impl TestOutcome {
    fn new(
        test: HypothesisTest,
        columns: &[&str],
        n: usize,
        (statistic, df, p_value): (f64, f64, f64),
        alpha: f64,
    ) -> Self {
        Self {
            test,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            n,
            statistic,
            df,
            p_value,
            alpha,
            reject: p_value < alpha,
        }
    }
}

/// Run `test` on the named table columns at significance level `alpha`.
pub fn run_test(
    table: &ResultsTable,
    test: HypothesisTest,
    columns: &[&str],
    alpha: f64,
) -> Result<TestOutcome> {
    if !(alpha > 0.0 && alpha < 1.0) {
        anyhow::bail!("alpha must be in (0, 1), got {alpha}");
    }
    if columns.len() != test.arity() {
        anyhow::bail!(
            "{} takes {} column(s), got {}",
            test.name(),
            test.arity(),
            columns.len()
        );
    }

    let x = table.require_column(columns[0])?;
    let result = match test {
        HypothesisTest::OneSampleT { mu } => one_sample_t(x, mu)?,
        HypothesisTest::JarqueBera => jarque_bera(x)?,
        HypothesisTest::PairedT => paired_t(x, table.require_column(columns[1])?)?,
        HypothesisTest::WelchT => welch_t(x, table.require_column(columns[1])?)?,
    };

    Ok(TestOutcome::new(test, columns, x.len(), result, alpha))
}

/// (t, df, p) for H0: mean(x) = mu.
pub fn one_sample_t(x: &[f64], mu: f64) -> Result<(f64, f64, f64)> {
    require_len(x, 2, "One-sample t test")?;
    let var = variance(x);
    if !(var > 0.0) {
        anyhow::bail!("One-sample t test is undefined for a constant sample");
    }
    let n = x.len() as f64;
    let t = (mean(x) - mu) / (var / n).sqrt();
    let df = n - 1.0;
    Ok((t, df, student_t_two_sided(t, df)))
}

/// (t, df, p) for H0: mean(x - y) = 0.
pub fn paired_t(x: &[f64], y: &[f64]) -> Result<(f64, f64, f64)> {
    if x.len() != y.len() {
        anyhow::bail!("Paired t test needs equal lengths, got {} and {}", x.len(), y.len());
    }
    let diffs: Vec<f64> = x.iter().zip(y).map(|(a, b)| a - b).collect();
    require_len(&diffs, 2, "Paired t test")?;
    if !(variance(&diffs) > 0.0) {
        anyhow::bail!("Paired t test is undefined: the differences are constant");
    }
    one_sample_t(&diffs, 0.0)
}

/// (t, Welch-Satterthwaite df, p) for H0: mean(x) = mean(y).
pub fn welch_t(x: &[f64], y: &[f64]) -> Result<(f64, f64, f64)> {
    require_len(x, 2, "Welch t test")?;
    require_len(y, 2, "Welch t test")?;
    let (n1, n2) = (x.len() as f64, y.len() as f64);
    let (v1, v2) = (variance(x) / n1, variance(y) / n2);
    let se2 = v1 + v2;
    if !(se2 > 0.0) {
        anyhow::bail!("Welch t test is undefined: both samples are constant");
    }
    let t = (mean(x) - mean(y)) / se2.sqrt();
    let df = se2 * se2 / (v1 * v1 / (n1 - 1.0) + v2 * v2 / (n2 - 1.0));
    Ok((t, df, student_t_two_sided(t, df)))
}

/// (JB, 2, p) where JB = n/6 (S^2 + (K - 3)^2 / 4).
pub fn jarque_bera(x: &[f64]) -> Result<(f64, f64, f64)> {
    require_len(x, 3, "Jarque-Bera test")?;
    let n = x.len() as f64;
    let m = mean(x);
    let central = |p: i32| x.iter().map(|v| (v - m).powi(p)).sum::<f64>() / n;
    let m2 = central(2);
    if !(m2 > 0.0) {
        anyhow::bail!("Jarque-Bera test is undefined for a constant sample");
    }
    let skew = central(3) / m2.powf(1.5);
    let kurt = central(4) / (m2 * m2);
    let jb = n / 6.0 * (skew * skew + (kurt - 3.0).powi(2) / 4.0);
    Ok((jb, 2.0, chi_squared_survival(jb, 2.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn test_one_sample_t_known_value() {
        let x = [3.0, 5.0, 5.0, 7.0];
        let var = variance(&x);
        assert!((var - 8.0 / 3.0).abs() < 1e-12);
        let (t, df, p) = one_sample_t(&x, 3.0).unwrap();
        let expected = 2.0 / (var / 4.0).sqrt();
        assert!((t - expected).abs() < 1e-12);
        assert_eq!(df, 3.0);
        assert!(p > 0.05 && p < 0.5);
    }

    #[test]
    fn test_paired_t_matches_one_sample_on_differences() {
        let x = [1.0, 2.0, 3.0, 5.0];
        let y = [0.5, 2.5, 2.0, 3.0];
        let d: Vec<f64> = x.iter().zip(&y).map(|(a, b)| a - b).collect();
        assert_eq!(paired_t(&x, &y).unwrap(), one_sample_t(&d, 0.0).unwrap());
    }

    #[test]
    fn test_welch_equal_samples() {
        let (t, _, p) = welch_t(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!(t.abs() < 1e-12);
        assert!((p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_welch_separated_samples_reject() {
        let (_, df, p) = welch_t(&[1.0, 1.1, 0.9, 1.05, 0.95], &[5.0, 5.2, 4.8, 5.1, 4.9]).unwrap();
        assert!(df > 0.0);
        assert!(p < 0.001, "got {p}");
    }

    #[test]
    fn test_jarque_bera_symmetric_sample() {
        let x: Vec<f64> = (-10..=10).map(|v| v as f64).collect();
        let (jb, df, p) = jarque_bera(&x).unwrap();
        // Uniform-ish sample: zero skew, platykurtic
        assert!(jb > 0.0);
        assert_eq!(df, 2.0);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_constant_sample_fails() {
        assert!(one_sample_t(&[2.0, 2.0, 2.0], 0.0).is_err());
        assert!(jarque_bera(&[2.0, 2.0, 2.0]).is_err());
    }

    #[test]
    fn test_run_test_carries_alpha_and_decision() {
        let table = ResultsTable::new(vec![Column {
            name: "a".to_string(),
            values: vec![10.0, 10.5, 9.5, 10.2, 9.8],
        }])
        .unwrap();
        let outcome =
            run_test(&table, HypothesisTest::OneSampleT { mu: 0.0 }, &["a"], 0.01).unwrap();
        assert_eq!(outcome.alpha, 0.01);
        assert!(outcome.reject);
        assert_eq!(outcome.columns, vec!["a"]);

        let err = run_test(&table, HypothesisTest::PairedT, &["a"], 0.05)
            .unwrap_err()
            .to_string();
        assert!(err.contains("2 column"), "got: {err}");
    }
}
