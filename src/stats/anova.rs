// One-way ANOVA across groups of scores.

use anyhow::Result;
use serde::Serialize;

use super::mean;
use super::special::f_survival;
use crate::corpus::triples::{LanguagePair, VarietyLabels};
use crate::similarity::traits::MetricFamily;
use crate::table::{column_name, ResultsTable};

#[derive(Debug, Clone, Serialize)]
pub struct AnovaResult {
    pub groups: Vec<String>,
    pub group_means: Vec<f64>,
    pub f_statistic: f64,
    pub df_between: usize,
    pub df_within: usize,
    pub p_value: f64,
    /// Total observations across groups
    pub n: usize,
}

/// One-way ANOVA over caller-supplied named groups.
pub fn anova_groups(groups: &[(String, Vec<f64>)]) -> Result<AnovaResult> {
    let k = groups.len();
    if k < 2 {
        anyhow::bail!("ANOVA needs at least 2 groups, got {k}");
    }
    if let Some((name, _)) = groups.iter().find(|(_, v)| v.is_empty()) {
        anyhow::bail!("ANOVA group '{name}' is empty");
    }

    let n: usize = groups.iter().map(|(_, v)| v.len()).sum();
    if n <= k {
        anyhow::bail!(
            "ANOVA has no within-group degrees of freedom ({n} observations, {k} groups)"
        );
    }

    let all: Vec<f64> = groups.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    let grand_mean = mean(&all);
    let group_means: Vec<f64> = groups.iter().map(|(_, v)| mean(v)).collect();

    let ss_between: f64 = groups
        .iter()
        .zip(&group_means)
        .map(|((_, v), m)| v.len() as f64 * (m - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = groups
        .iter()
        .zip(&group_means)
        .map(|((_, v), m)| v.iter().map(|x| (x - m).powi(2)).sum::<f64>())
        .sum();

    let df_between = k - 1;
    let df_within = n - k;
    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;

    let f_statistic = if ms_within > 0.0 {
        ms_between / ms_within
    } else if ms_between > 0.0 {
        f64::INFINITY
    } else {
        anyhow::bail!("ANOVA is undefined: every observation is identical");
    };

    Ok(AnovaResult {
        groups: groups.iter().map(|(name, _)| name.clone()).collect(),
        group_means,
        f_statistic,
        df_between,
        df_within,
        p_value: f_survival(f_statistic, df_between as f64, df_within as f64),
        n,
    })
}

/// Compare the three language pairs of one metric family.
pub fn anova_by_pair(
    table: &ResultsTable,
    family: MetricFamily,
    labels: &VarietyLabels,
) -> Result<AnovaResult> {
    let groups = LanguagePair::ALL
        .into_iter()
        .map(|pair| {
            let name = column_name(pair, family, labels);
            table.require_column(&name).map(|v| (name.clone(), v.to_vec()))
        })
        .collect::<Result<Vec<_>>>()?;
    anova_groups(&groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(name: &str, v: &[f64]) -> (String, Vec<f64>) {
        (name.to_string(), v.to_vec())
    }

    #[test]
    fn test_known_f_statistic() {
        // SS_between = 24 on 2 df, SS_within = 6 on 6 df: F = 12
        let r = anova_groups(&[
            g("a", &[1.0, 2.0, 3.0]),
            g("b", &[3.0, 4.0, 5.0]),
            g("c", &[5.0, 6.0, 7.0]),
        ])
        .unwrap();
        assert_eq!(r.df_between, 2);
        assert_eq!(r.df_within, 6);
        assert!((r.f_statistic - 12.0).abs() < 1e-10, "got {}", r.f_statistic);
        assert!(r.p_value < 0.01);
        assert_eq!(r.group_means, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_equal_groups_have_high_p() {
        let r = anova_groups(&[g("a", &[1.0, 2.0, 3.0]), g("b", &[1.0, 2.0, 3.0])]).unwrap();
        assert!(r.f_statistic.abs() < 1e-12);
        assert!((r.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_group_fails() {
        let err = anova_groups(&[g("a", &[1.0, 2.0])]).unwrap_err().to_string();
        assert!(err.contains("at least 2 groups"), "got: {err}");
    }

    #[test]
    fn test_no_within_df_fails() {
        let err = anova_groups(&[g("a", &[1.0]), g("b", &[2.0])])
            .unwrap_err()
            .to_string();
        assert!(err.contains("degrees of freedom"), "got: {err}");
    }
}
