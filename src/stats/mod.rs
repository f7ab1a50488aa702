// Statistical analyzers over the results table.
//
// Every analyzer is a stateless function that borrows its input and returns
// a plain serializable value. Unmet preconditions (too few rows, a constant
// predictor, fewer than two groups) come back as errors with a readable
// reason; nothing here panics on bad data.

pub mod anova;
pub mod clustering;
pub mod correlation;
pub mod dendrogram;
pub mod hypothesis;
pub mod pca;
pub mod qexp;
pub mod regression;
pub mod special;

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator). NaN below two values.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Fail unless `values` has at least `min` entries.
pub(crate) fn require_len(values: &[f64], min: usize, what: &str) -> anyhow::Result<()> {
    if values.len() < min {
        anyhow::bail!(
            "{what} needs at least {min} observations, got {}",
            values.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variance() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&v) - 5.0).abs() < 1e-12);
        assert!((variance(&v) - 32.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inputs_are_nan() {
        assert!(mean(&[]).is_nan());
        assert!(variance(&[1.0]).is_nan());
    }
}
