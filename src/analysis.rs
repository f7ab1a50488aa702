// Analysis orchestration: compute the similarity table, then run every
// statistical analyzer over it.
//
// Analyzers are independent. Each one's result lands in its own
// `AnalyzerOutcome` slot, and a failing analyzer is logged and recorded
// without stopping the others.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::corpus::triples::{LanguagePair, SentenceTriples, VarietyLabels};
use crate::similarity::traits::{MetricFamily, SimilarityMetric};
use crate::stats::anova::{anova_by_pair, AnovaResult};
use crate::stats::clustering::{self, kmeans, ClusterAssignment};
use crate::stats::correlation::{correlation_matrix, CorrelationMatrix};
use crate::stats::dendrogram::{linkage, Dendrogram, Linkage};
use crate::stats::hypothesis::{self, run_test, HypothesisTest, TestOutcome};
use crate::stats::pca::{pca, PcaResult};
use crate::stats::qexp::{self, fit_column, QExpFit, QExpResult};
use crate::stats::regression::{linear_regression, multiple_regression, RegressionResult};
use crate::table::{column_name, ResultsTable};

/// Result of one analyzer: its value, or why it could not run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzerOutcome<T> {
    Ok(T),
    Failed { reason: String },
}

impl<T> AnalyzerOutcome<T> {
    pub fn ok(&self) -> Option<&T> {
        match self {
            Self::Ok(v) => Some(v),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// An outcome with a label saying what it was run on.
#[derive(Debug, Clone, Serialize)]
pub struct Labeled<T> {
    pub label: String,
    pub outcome: AnalyzerOutcome<T>,
}

/// Flat clusters from cutting the dendrogram.
#[derive(Debug, Clone, Serialize)]
pub struct DendrogramCut {
    pub k: usize,
    pub labels: Vec<usize>,
}

/// One hypothesis test to run, on the named columns.
#[derive(Debug, Clone, Serialize)]
pub struct TestSpec {
    pub test: HypothesisTest,
    pub columns: Vec<String>,
}

/// What to analyze and with which parameters.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPlan {
    /// Response column for both regressions
    pub response: String,
    /// Predictor of the simple regression
    pub predictor: String,
    /// Predictors of the multiple regression
    pub predictors: Vec<String>,
    /// Families compared across language pairs by ANOVA
    pub anova_families: Vec<MetricFamily>,
    pub tests: Vec<TestSpec>,
    pub pca_components: usize,
    pub clusters: usize,
    pub linkage: Linkage,
    pub qexp_column: String,
    /// x for the q-exponential fit; row index when None
    pub qexp_covariate: Option<String>,
    pub alpha: f64,
    pub fit_max_iter: usize,
    pub kmeans_max_iter: usize,
    pub seed: u64,
    pub labels: VarietyLabels,
}

impl AnalysisPlan {
    /// Default plan for a table: the first column is the response, the
    /// second the simple-regression predictor, every other column a
    /// multiple-regression predictor. The q-exponential is fitted to the
    /// first base-modern column, or the first column when there is none.
    pub fn for_table(table: &ResultsTable, labels: &VarietyLabels) -> Result<Self> {
        let names: Vec<String> = table.column_names().iter().map(|s| s.to_string()).collect();
        let Some(first) = names.first().cloned() else {
            anyhow::bail!("Cannot plan an analysis for a table with no columns");
        };
        let second = names.get(1).cloned().unwrap_or_else(|| first.clone());

        let qexp_column = names
            .iter()
            .find(|name| {
                MetricFamily::ALL
                    .into_iter()
                    .any(|family| **name == column_name(LanguagePair::BaseModern, family, labels))
            })
            .cloned()
            .unwrap_or_else(|| first.clone());

        let anova_families = MetricFamily::ALL
            .into_iter()
            .filter(|&family| {
                LanguagePair::ALL
                    .into_iter()
                    .all(|pair| table.column(&column_name(pair, family, labels)).is_some())
            })
            .collect();

        let mut tests = vec![
            TestSpec {
                test: HypothesisTest::JarqueBera,
                columns: vec![first.clone()],
            },
            TestSpec {
                test: HypothesisTest::OneSampleT { mu: 0.0 },
                columns: vec![first.clone()],
            },
        ];
        if names.len() >= 2 {
            for test in [HypothesisTest::PairedT, HypothesisTest::WelchT] {
                tests.push(TestSpec {
                    test,
                    columns: vec![first.clone(), second.clone()],
                });
            }
        }

        Ok(Self {
            predictors: names[1..].to_vec(),
            response: first.clone(),
            predictor: second,
            anova_families,
            tests,
            pca_components: names.len().min(2),
            clusters: table.row_count().clamp(1, 3),
            linkage: Linkage::Ward,
            qexp_column,
            qexp_covariate: None,
            alpha: hypothesis::DEFAULT_ALPHA,
            fit_max_iter: qexp::DEFAULT_MAX_ITER,
            kmeans_max_iter: clustering::DEFAULT_MAX_ITER,
            seed: clustering::DEFAULT_SEED,
            labels: labels.clone(),
        })
    }
}

/// Everything `run_all` produced for one table.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub columns: Vec<String>,
    /// Rows analyzed, after dropping incomplete ones
    pub rows: usize,
    pub dropped_rows: usize,
    pub correlation: AnalyzerOutcome<CorrelationMatrix>,
    pub regression: AnalyzerOutcome<RegressionResult>,
    pub multiple_regression: AnalyzerOutcome<RegressionResult>,
    pub anova: Vec<Labeled<AnovaResult>>,
    pub tests: Vec<Labeled<TestOutcome>>,
    pub pca: AnalyzerOutcome<PcaResult>,
    pub kmeans: AnalyzerOutcome<ClusterAssignment>,
    pub dendrogram: AnalyzerOutcome<Dendrogram>,
    pub dendrogram_clusters: AnalyzerOutcome<DendrogramCut>,
    pub qexp: AnalyzerOutcome<QExpResult>,
}

impl AnalysisReport {
    /// (analyzer, reason) for every slot that failed.
    pub fn failures(&self) -> Vec<(String, String)> {
        fn push<T>(out: &mut Vec<(String, String)>, name: &str, o: &AnalyzerOutcome<T>) {
            if let AnalyzerOutcome::Failed { reason } = o {
                out.push((name.to_string(), reason.clone()));
            }
        }
        let mut out = Vec::new();
        push(&mut out, "correlation", &self.correlation);
        push(&mut out, "regression", &self.regression);
        push(&mut out, "multiple regression", &self.multiple_regression);
        for a in &self.anova {
            push(&mut out, &format!("ANOVA {}", a.label), &a.outcome);
        }
        for t in &self.tests {
            push(&mut out, &t.label, &t.outcome);
        }
        push(&mut out, "PCA", &self.pca);
        push(&mut out, "k-means", &self.kmeans);
        push(&mut out, "dendrogram", &self.dendrogram);
        push(&mut out, "dendrogram cut", &self.dendrogram_clusters);
        push(&mut out, "q-exponential", &self.qexp);
        out
    }
}

fn run<T>(name: &str, f: impl FnOnce() -> Result<T>) -> AnalyzerOutcome<T> {
    match f() {
        Ok(value) => {
            debug!(analyzer = name, "Analyzer finished");
            AnalyzerOutcome::Ok(value)
        }
        Err(e) => {
            warn!(analyzer = name, error = %e, "Analyzer failed");
            AnalyzerOutcome::Failed {
                reason: format!("{e:#}"),
            }
        }
    }
}

/// Run every analyzer of the plan over the table.
///
/// Rows holding a NaN are dropped once up front, and the count is reported.
pub fn run_all(table: &ResultsTable, plan: &AnalysisPlan) -> AnalysisReport {
    let (clean, dropped_rows) = table.drop_incomplete_rows();
    if dropped_rows > 0 {
        warn!(dropped_rows, kept = clean.row_count(), "Dropped rows with missing scores");
    }
    info!(
        rows = clean.row_count(),
        columns = clean.column_count(),
        "Running statistical analyses"
    );

    let predictors: Vec<&str> = plan.predictors.iter().map(String::as_str).collect();

    let anova = plan
        .anova_families
        .iter()
        .map(|&family| Labeled {
            label: family.label().to_string(),
            outcome: run("anova", || anova_by_pair(&clean, family, &plan.labels)),
        })
        .collect();

    let tests = plan
        .tests
        .iter()
        .map(|spec| {
            let columns: Vec<&str> = spec.columns.iter().map(String::as_str).collect();
            Labeled {
                label: format!("{} ({})", spec.test.name(), spec.columns.join(" vs ")),
                outcome: run(spec.test.name(), || {
                    run_test(&clean, spec.test, &columns, plan.alpha)
                }),
            }
        })
        .collect();

    let dendrogram = run("dendrogram", || linkage(&clean, plan.linkage));
    let dendrogram_clusters = match &dendrogram {
        AnalyzerOutcome::Ok(d) => run("dendrogram cut", || {
            d.cut(plan.clusters).map(|labels| DendrogramCut {
                k: plan.clusters,
                labels,
            })
        }),
        AnalyzerOutcome::Failed { reason } => AnalyzerOutcome::Failed {
            reason: reason.clone(),
        },
    };

    let qexp = run("q-exponential", || {
        fit_column(
            &clean,
            &plan.qexp_column,
            plan.qexp_covariate.as_deref(),
            plan.fit_max_iter,
        )
    });
    if let AnalyzerOutcome::Ok(QExpResult {
        fit: QExpFit::Failed { reason, .. },
        ..
    }) = &qexp
    {
        warn!(column = %plan.qexp_column, %reason, "q-exponential fit did not converge");
    }

    AnalysisReport {
        columns: clean.column_names().iter().map(|s| s.to_string()).collect(),
        rows: clean.row_count(),
        dropped_rows,
        correlation: run("correlation", || correlation_matrix(&clean)),
        regression: run("regression", || {
            linear_regression(&clean, &plan.predictor, &plan.response)
        }),
        multiple_regression: run("multiple regression", || {
            multiple_regression(&clean, &predictors, &plan.response)
        }),
        anova,
        tests,
        pca: run("pca", || pca(&clean, plan.pca_components)),
        kmeans: run("k-means", || {
            kmeans(&clean, plan.clusters, plan.kmeans_max_iter, plan.seed)
        }),
        dendrogram,
        dendrogram_clusters,
        qexp,
    }
}

/// Run each metric over the triples, in order, and aggregate the table.
pub fn compute_table(
    triples: &SentenceTriples,
    metrics: &[&dyn SimilarityMetric],
    labels: &VarietyLabels,
) -> Result<ResultsTable> {
    let (b, a, m) = triples.lengths();
    info!(
        base = b,
        archaic = a,
        modern = m,
        metrics = metrics.len(),
        "Computing similarity scores"
    );

    let pb = ProgressBar::new(metrics.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Metrics [{bar:30}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?,
    );

    let mut scores = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let family = metric.family();
        pb.set_message(family.label());
        let pair_scores = metric
            .compare(triples)
            .with_context(|| format!("{family} similarity failed"))?;
        debug!(%family, rows = pair_scores.base_archaic.len(), "Metric finished");
        scores.push(pair_scores);
        pb.inc(1);
    }
    pb.finish_and_clear();

    ResultsTable::from_pair_scores(&scores, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::ngram::NgramSimilarity;
    use crate::similarity::phonology::PhonologicalSimilarity;
    use crate::table::Column;

    fn table() -> ResultsTable {
        let cols = [
            ("a", vec![0.1, 0.4, 0.35, 0.8, 0.7, 0.9, 0.2, 0.5]),
            ("b", vec![0.2, 0.5, 0.3, 0.9, 0.6, 0.8, 0.25, 0.45]),
            ("c", vec![0.9, 0.1, 0.6, 0.2, 0.4, 0.3, 0.7, 0.55]),
        ];
        ResultsTable::new(
            cols.into_iter()
                .map(|(n, v)| Column {
                    name: n.to_string(),
                    values: v,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_default_plan_uses_table_columns() {
        let plan = AnalysisPlan::for_table(&table(), &VarietyLabels::default()).unwrap();
        assert_eq!(plan.response, "a");
        assert_eq!(plan.predictor, "b");
        assert_eq!(plan.predictors, vec!["b", "c"]);
        assert_eq!(plan.pca_components, 2);
        assert!(plan.anova_families.is_empty());
        assert_eq!(plan.qexp_column, "a");
    }

    #[test]
    fn test_default_qexp_column_is_base_modern() {
        let triples = SentenceTriples::new(
            vec!["ai kuai".into(), "dzu bu".into(), "bo".into(), "aré".into()],
            vec!["casa grãde".into(), "moço".into(), "rio".into(), "muyto".into()],
            vec!["casa grande".into(), "moço".into(), "rio".into(), "muito".into()],
        );
        let labels = VarietyLabels::default();
        let phon = PhonologicalSimilarity;
        let ngram = NgramSimilarity::default();
        let metrics: [&dyn SimilarityMetric; 2] = [&phon, &ngram];
        let t = compute_table(&triples, &metrics, &labels).unwrap();

        let plan = AnalysisPlan::for_table(&t, &labels).unwrap();
        assert_eq!(plan.qexp_column, "Dzubukuá - Moderno (Fonológica)");
        assert_eq!(plan.response, "Dzubukuá - Arcaico (Fonológica)");
    }

    #[test]
    fn test_run_all_fills_every_slot() {
        let t = table();
        let plan = AnalysisPlan::for_table(&t, &VarietyLabels::default()).unwrap();
        let report = run_all(&t, &plan);
        assert_eq!(report.rows, 8);
        assert_eq!(report.dropped_rows, 0);
        assert!(report.correlation.is_ok());
        assert!(report.regression.is_ok());
        assert!(report.multiple_regression.is_ok());
        assert!(report.pca.is_ok());
        assert!(report.kmeans.is_ok());
        assert!(report.dendrogram.is_ok());
        assert_eq!(report.dendrogram_clusters.ok().map(|c| c.labels.len()), Some(8));
        assert_eq!(report.tests.len(), 4);
    }

    #[test]
    fn test_failure_is_local() {
        let t = table();
        let mut plan = AnalysisPlan::for_table(&t, &VarietyLabels::default()).unwrap();
        plan.pca_components = 10;
        plan.predictor = "missing".to_string();
        let report = run_all(&t, &plan);

        assert!(!report.pca.is_ok());
        assert!(!report.regression.is_ok());
        assert!(report.correlation.is_ok());
        assert!(report.kmeans.is_ok());
        let failed: Vec<String> = report.failures().into_iter().map(|f| f.0).collect();
        assert!(failed.contains(&"PCA".to_string()));
        assert!(failed.contains(&"regression".to_string()));
    }

    #[test]
    fn test_nan_rows_are_dropped_once() {
        let t = ResultsTable::new(vec![
            Column {
                name: "a".to_string(),
                values: vec![0.1, f64::NAN, 0.3, 0.5, 0.4],
            },
            Column {
                name: "b".to_string(),
                values: vec![0.2, 0.3, 0.1, 0.6, 0.5],
            },
        ])
        .unwrap();
        let plan = AnalysisPlan::for_table(&t, &VarietyLabels::default()).unwrap();
        let report = run_all(&t, &plan);
        assert_eq!(report.dropped_rows, 1);
        assert_eq!(report.rows, 4);
        assert_eq!(report.correlation.ok().map(|c| c.n), Some(4));
    }

    #[test]
    fn test_compute_table_shape() {
        let triples = SentenceTriples::new(
            vec!["ai kuai".into(), "dzu bu".into()],
            vec!["casa grãde".into(), "moço".into()],
            vec!["casa grande".into(), "moço".into()],
        );
        let ngram = NgramSimilarity::default();
        let phon = PhonologicalSimilarity;
        let metrics: [&dyn SimilarityMetric; 2] = [&ngram, &phon];
        let t = compute_table(&triples, &metrics, &VarietyLabels::default()).unwrap();
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.column_count(), 6);
        assert!(!t.has_missing());
    }
}
