// Markdown report: the similarity summary and every analysis of one run.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use super::{format_num, format_p};
use crate::analysis::{AnalysisReport, AnalyzerOutcome};
use crate::stats::qexp::QExpFit;
use crate::stats::{mean, std_dev};
use crate::table::ResultsTable;

/// Render the report and write it to `output_path`. Returns the path written.
pub fn generate_report(
    input: &Path,
    table: &ResultsTable,
    report: &AnalysisReport,
    output_path: &str,
) -> Result<String> {
    let markdown = render_report(input, table, report);
    let path = Path::new(output_path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, markdown).with_context(|| format!("Failed to write {output_path}"))?;
    Ok(output_path.to_string())
}

fn failed<T>(md: &mut String, outcome: &AnalyzerOutcome<T>) -> bool {
    if let AnalyzerOutcome::Failed { reason } = outcome {
        let _ = writeln!(md, "_Not available: {reason}_\n");
        true
    } else {
        false
    }
}

pub fn render_report(input: &Path, table: &ResultsTable, report: &AnalysisReport) -> String {
    let mut md = String::new();
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    // String formatting into a String cannot fail
    let _ = writeln!(md, "# Linguistic similarity report\n");
    let _ = writeln!(md, "- Input: `{}`", input.display());
    let _ = writeln!(md, "- Generated: {now}");
    let _ = writeln!(
        md,
        "- Sentences: {} ({} analyzed, {} dropped for missing scores)\n",
        table.row_count(),
        report.rows,
        report.dropped_rows
    );

    let _ = writeln!(md, "## Similarity scores\n");
    let _ = writeln!(md, "| Column | Mean | SD |");
    let _ = writeln!(md, "|---|---:|---:|");
    for col in table.columns() {
        let finite: Vec<f64> = col.values.iter().copied().filter(|v| v.is_finite()).collect();
        let _ = writeln!(
            md,
            "| {} | {} | {} |",
            col.name,
            format_num(mean(&finite), 3),
            format_num(std_dev(&finite), 3)
        );
    }

    let _ = writeln!(md, "\n## Correlation\n");
    if !failed(&mut md, &report.correlation) {
        if let AnalyzerOutcome::Ok(c) = &report.correlation {
            let _ = write!(md, "| |");
            for j in 0..c.columns.len() {
                let _ = write!(md, " {} |", j + 1);
            }
            let _ = write!(md, "\n|---|");
            for _ in 0..c.columns.len() {
                let _ = write!(md, "---:|");
            }
            md.push('\n');
            for (i, row) in c.r.iter().enumerate() {
                let _ = write!(md, "| {}. {} |", i + 1, c.columns[i]);
                for r in row {
                    let _ = write!(md, " {} |", format_num(*r, 2));
                }
                md.push('\n');
            }
            md.push('\n');
        }
    }

    let _ = writeln!(md, "## Regression\n");
    for outcome in [&report.regression, &report.multiple_regression] {
        if failed(&mut md, outcome) {
            continue;
        }
        if let AnalyzerOutcome::Ok(r) = outcome {
            let _ = writeln!(
                md,
                "**{} ~ {}**: R² = {}, adjusted R² = {}, F = {} (p = {}), n = {}\n",
                r.response,
                r.predictors.join(" + "),
                format_num(r.r_squared, 3),
                format_num(r.adj_r_squared, 3),
                format_num(r.f_statistic, 3),
                format_p(r.f_p_value),
                r.n
            );
            let _ = writeln!(md, "| Term | Estimate | SE | t | p |");
            let _ = writeln!(md, "|---|---:|---:|---:|---:|");
            for c in &r.coefficients {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {} | {} |",
                    c.name,
                    format_num(c.estimate, 4),
                    format_num(c.std_error, 4),
                    format_num(c.t_statistic, 2),
                    format_p(c.p_value)
                );
            }
            md.push('\n');
        }
    }

    if !report.anova.is_empty() {
        let _ = writeln!(md, "## ANOVA across language pairs\n");
        for entry in &report.anova {
            let _ = writeln!(md, "### {}\n", entry.label);
            if let AnalyzerOutcome::Ok(a) = &entry.outcome {
                let _ = writeln!(
                    md,
                    "F({}, {}) = {}, p = {}\n",
                    a.df_between,
                    a.df_within,
                    format_num(a.f_statistic, 3),
                    format_p(a.p_value)
                );
                for (g, m) in a.groups.iter().zip(&a.group_means) {
                    let _ = writeln!(md, "- {g}: mean {}", format_num(*m, 3));
                }
                md.push('\n');
            } else {
                failed(&mut md, &entry.outcome);
            }
        }
    }

    let _ = writeln!(md, "## Hypothesis tests\n");
    let _ = writeln!(md, "| Test | Statistic | df | p | alpha | Decision |");
    let _ = writeln!(md, "|---|---:|---:|---:|---:|---|");
    for entry in &report.tests {
        match &entry.outcome {
            AnalyzerOutcome::Ok(t) => {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {} | {} | {} |",
                    entry.label,
                    format_num(t.statistic, 3),
                    format_num(t.df, 1),
                    format_p(t.p_value),
                    t.alpha,
                    if t.reject { "reject H0" } else { "retain H0" }
                );
            }
            AnalyzerOutcome::Failed { reason } => {
                let _ = writeln!(md, "| {} | | | | | not run: {} |", entry.label, reason);
            }
        }
    }

    let _ = writeln!(md, "\n## PCA\n");
    if !failed(&mut md, &report.pca) {
        if let AnalyzerOutcome::Ok(p) = &report.pca {
            for (c, ratio) in p.explained_variance_ratio.iter().enumerate() {
                let _ = writeln!(md, "- PC{}: {:.1}% of variance", c + 1, ratio * 100.0);
            }
            md.push('\n');
        }
    }

    let _ = writeln!(md, "## Clustering\n");
    if !failed(&mut md, &report.kmeans) {
        if let AnalyzerOutcome::Ok(k) = &report.kmeans {
            let _ = writeln!(
                md,
                "k-means with k = {}: cluster sizes {:?}, inertia {}, {} iterations\n",
                k.k,
                k.cluster_sizes(),
                format_num(k.inertia, 4),
                k.iterations
            );
        }
    }
    if !failed(&mut md, &report.dendrogram) {
        if let AnalyzerOutcome::Ok(d) = &report.dendrogram {
            let _ = writeln!(
                md,
                "Hierarchical clustering ({} linkage), final merge height {}\n",
                d.linkage,
                format_num(d.height(), 4)
            );
        }
    }

    let _ = writeln!(md, "## Q-exponential fit\n");
    if !failed(&mut md, &report.qexp) {
        if let AnalyzerOutcome::Ok(q) = &report.qexp {
            match &q.fit {
                QExpFit::Converged {
                    a,
                    b,
                    q: qv,
                    r_squared,
                    ..
                } => {
                    let _ = writeln!(
                        md,
                        "`{}`: a = {}, b = {}, q = {}, R² = {}",
                        q.column,
                        format_num(*a, 4),
                        format_num(*b, 4),
                        format_num(*qv, 4),
                        format_num(*r_squared, 4)
                    );
                }
                QExpFit::Failed { reason, .. } => {
                    let _ = writeln!(md, "`{}`: did not converge ({reason})", q.column);
                }
            }
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{run_all, AnalysisPlan};
    use crate::corpus::triples::VarietyLabels;
    use crate::table::Column;

    #[test]
    fn test_report_has_every_section() {
        let table = ResultsTable::new(vec![
            Column {
                name: "a".to_string(),
                values: vec![0.1, 0.5, 0.3, 0.9, 0.7],
            },
            Column {
                name: "b".to_string(),
                values: vec![0.2, 0.4, 0.35, 0.8, 0.75],
            },
        ])
        .unwrap();
        let plan = AnalysisPlan::for_table(&table, &VarietyLabels::default()).unwrap();
        let report = run_all(&table, &plan);
        let md = render_report(Path::new("corpus.csv"), &table, &report);

        for section in [
            "# Linguistic similarity report",
            "## Correlation",
            "## Regression",
            "## Hypothesis tests",
            "## PCA",
            "## Clustering",
            "## Q-exponential fit",
        ] {
            assert!(md.contains(section), "missing {section}");
        }
        assert!(md.contains("`corpus.csv`"));
    }
}
