// Colored terminal output for the similarity table and analysis results.
//
// This module handles all terminal-specific formatting: colors, tables and
// verdicts. The main.rs command handlers delegate here.

use colored::Colorize;

use super::{format_num, format_p, truncate_chars};
use crate::analysis::{AnalysisReport, AnalyzerOutcome};
use crate::stats::correlation::CorrelationMatrix;
use crate::stats::qexp::{QExpFit, QExpResult};
use crate::stats::regression::RegressionResult;
use crate::stats::{mean, std_dev};
use crate::table::ResultsTable;

const NAME_WIDTH: usize = 36;

fn header(title: &str) {
    println!("\n{}", format!("=== {title} ===").bold());
}

/// Print a failed slot in a uniform way; returns the value if present.
fn unwrap_or_report<'a, T>(name: &str, outcome: &'a AnalyzerOutcome<T>) -> Option<&'a T> {
    match outcome {
        AnalyzerOutcome::Ok(v) => Some(v),
        AnalyzerOutcome::Failed { reason } => {
            println!("  {} {}: {}", "x".red(), name, reason.dimmed());
            None
        }
    }
}

/// Per-column descriptive statistics of the similarity table.
pub fn display_table_summary(table: &ResultsTable) {
    header(&format!(
        "Similarity scores ({} sentences, {} columns)",
        table.row_count(),
        table.column_count()
    ));
    println!();
    println!(
        "  {:<width$} {:>7} {:>7} {:>7} {:>7}",
        "Column".dimmed(),
        "Mean".dimmed(),
        "SD".dimmed(),
        "Min".dimmed(),
        "Max".dimmed(),
        width = NAME_WIDTH
    );
    println!("  {}", "-".repeat(NAME_WIDTH + 32).dimmed());

    for col in table.columns() {
        let finite: Vec<f64> = col.values.iter().copied().filter(|v| v.is_finite()).collect();
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        println!(
            "  {:<width$} {:>7} {:>7} {:>7} {:>7}",
            truncate_chars(&col.name, NAME_WIDTH - 3),
            format_num(mean(&finite), 3),
            format_num(std_dev(&finite), 3),
            format_num(if finite.is_empty() { f64::NAN } else { min }, 3),
            format_num(if finite.is_empty() { f64::NAN } else { max }, 3),
            width = NAME_WIDTH
        );
    }
}

/// Every analyzer outcome of a run.
pub fn display_report(report: &AnalysisReport) {
    header(&format!("Analyses ({} rows)", report.rows));
    if report.dropped_rows > 0 {
        println!(
            "  {} {} rows with missing scores were dropped",
            "!".yellow(),
            report.dropped_rows
        );
    }

    if let Some(corr) = unwrap_or_report("Correlation", &report.correlation) {
        display_correlation(corr);
    }

    header("Regression");
    if let Some(r) = unwrap_or_report("Simple regression", &report.regression) {
        display_regression(r);
    }
    if let Some(r) = unwrap_or_report("Multiple regression", &report.multiple_regression) {
        display_regression(r);
    }

    if !report.anova.is_empty() {
        header("ANOVA across language pairs");
        for entry in &report.anova {
            if let Some(a) = unwrap_or_report(&entry.label, &entry.outcome) {
                let means: Vec<String> = a.group_means.iter().map(|m| format_num(*m, 3)).collect();
                println!(
                    "  {:<12} F({}, {}) = {:>8}  p = {:<7} means: {}",
                    entry.label,
                    a.df_between,
                    a.df_within,
                    format_num(a.f_statistic, 3),
                    format_p(a.p_value),
                    means.join(" / ")
                );
            }
        }
    }

    header("Hypothesis tests");
    for entry in &report.tests {
        if let Some(t) = unwrap_or_report(&entry.label, &entry.outcome) {
            let verdict = if t.reject {
                "reject H0".red().bold()
            } else {
                "retain H0".green()
            };
            println!(
                "  {:<width$} stat = {:>8}  df = {:>6}  p = {:<7} {} (alpha {})",
                truncate_chars(t.test.name(), NAME_WIDTH),
                format_num(t.statistic, 3),
                format_num(t.df, 1),
                format_p(t.p_value),
                verdict,
                t.alpha,
                width = 14
            );
        }
    }

    header("PCA");
    if let Some(p) = unwrap_or_report("PCA", &report.pca) {
        for (c, (var, ratio)) in p
            .explained_variance
            .iter()
            .zip(&p.explained_variance_ratio)
            .enumerate()
        {
            println!(
                "  PC{}: variance {}  ({:.1}% of total)",
                c + 1,
                format_num(*var, 4),
                ratio * 100.0
            );
        }
    }

    header("Clustering");
    if let Some(k) = unwrap_or_report("k-means", &report.kmeans) {
        let sizes: Vec<String> = k.cluster_sizes().iter().map(|s| s.to_string()).collect();
        println!(
            "  k-means: k = {}, sizes [{}], inertia {}, {} iterations{}",
            k.k,
            sizes.join(", "),
            format_num(k.inertia, 4),
            k.iterations,
            if k.converged { "" } else { " (iteration cap reached)" }
        );
    }
    if let Some(d) = unwrap_or_report("Dendrogram", &report.dendrogram) {
        println!(
            "  Dendrogram ({} linkage): {} merges, height {}",
            d.linkage,
            d.merges.len(),
            format_num(d.height(), 4)
        );
        let order: Vec<String> = d.leaf_order().iter().map(|l| l.to_string()).collect();
        println!("  Leaf order: {}", truncate_chars(&order.join(" "), 70).dimmed());
    }
    if let Some(cut) = unwrap_or_report("Dendrogram cut", &report.dendrogram_clusters) {
        let labels: Vec<String> = cut.labels.iter().map(|l| l.to_string()).collect();
        println!("  Cut into {}: {}", cut.k, truncate_chars(&labels.join(" "), 70).dimmed());
    }

    header("Q-exponential fit");
    if let Some(q) = unwrap_or_report("Q-exponential", &report.qexp) {
        display_qexp(q);
    }

    let failures = report.failures();
    if !failures.is_empty() {
        println!(
            "\n  {} {} analyzer(s) could not run; see reasons above",
            "!".yellow(),
            failures.len()
        );
    }
}

/// Correlation matrix with numbered columns and a legend.
pub fn display_correlation(corr: &CorrelationMatrix) {
    header(&format!("Pearson correlation (n = {})", corr.n));
    for (i, name) in corr.columns.iter().enumerate() {
        println!("  [{}] {}", i + 1, name.dimmed());
    }
    println!();

    let mut head = String::from("      ");
    for j in 0..corr.columns.len() {
        head.push_str(&format!("{:>8}", format!("[{}]", j + 1)));
    }
    println!("{}", head.dimmed());

    for (i, row) in corr.r.iter().enumerate() {
        let mut line = format!("  {:>4}", format!("[{}]", i + 1));
        for (j, r) in row.iter().enumerate() {
            let cell = format!("{:>8}", format_num(*r, 2));
            let significant = i != j && corr.p_values[i][j] < 0.05;
            if significant {
                line.push_str(&cell.bold().to_string());
            } else {
                line.push_str(&cell);
            }
        }
        println!("{line}");
    }
    println!("  {}", "bold: p < 0.05".dimmed());
}

fn display_regression(r: &RegressionResult) {
    println!(
        "\n  {} ~ {}",
        r.response.bold(),
        r.predictors.join(" + ")
    );
    println!(
        "  R² = {}  adj. R² = {}  F = {} (p = {})  n = {}",
        format_num(r.r_squared, 3),
        format_num(r.adj_r_squared, 3),
        format_num(r.f_statistic, 3),
        format_p(r.f_p_value),
        r.n
    );
    for (i, c) in r.coefficients.iter().enumerate() {
        let vif = i
            .checked_sub(1)
            .and_then(|j| r.vif.get(j))
            .filter(|_| r.predictors.len() > 1)
            .map(|v| format!("  VIF {}", format_num(*v, 2)))
            .unwrap_or_default();
        println!(
            "    {:<width$} {:>9} ± {:<8} t = {:>7}  p = {}{}",
            truncate_chars(&c.name, NAME_WIDTH - 3),
            format_num(c.estimate, 4),
            format_num(c.std_error, 4),
            format_num(c.t_statistic, 2),
            format_p(c.p_value),
            vif,
            width = NAME_WIDTH
        );
    }
}

/// A q-exponential fit result.
pub fn display_qexp(q: &QExpResult) {
    let x = q.covariate.as_deref().unwrap_or("row index");
    println!("  {} vs {} (n = {})", q.column.bold(), x, q.n);
    match &q.fit {
        QExpFit::Converged {
            a,
            b,
            q: qv,
            sse,
            r_squared,
            iterations,
        } => {
            println!(
                "  {} a = {}  b = {}  q = {}",
                "converged".green(),
                format_num(*a, 4),
                format_num(*b, 4),
                format_num(*qv, 4)
            );
            println!(
                "  SSE = {}  R² = {}  ({} iterations)",
                format_num(*sse, 6),
                format_num(*r_squared, 4),
                iterations
            );
        }
        QExpFit::Failed { reason, initial } => {
            println!("  {} {}", "did not converge:".red(), reason);
            println!(
                "  initial guess a = {}, b = {}, q = {}",
                format_num(initial.0, 4),
                format_num(initial.1, 4),
                format_num(initial.2, 4)
            );
        }
    }
}
