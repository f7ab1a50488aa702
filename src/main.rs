use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use cognata::analysis::{self, AnalysisPlan};
use cognata::config::Config;
use cognata::corpus::loader;
use cognata::similarity::embeddings::OnnxSentenceEncoder;
use cognata::similarity::ngram::NgramSimilarity;
use cognata::similarity::phonology::PhonologicalSimilarity;
use cognata::similarity::semantic::SemanticSimilarity;
use cognata::similarity::traits::{MetricFamily, SimilarityMetric};
use cognata::similarity::wordvec::WordVectorSimilarity;
use cognata::stats::dendrogram::Linkage;
use cognata::table::ResultsTable;

/// Cognata: similarity and statistics for parallel texts across language varieties.
///
/// Scores aligned sentences of a base language, its archaic translation and
/// a modern translation on semantic, lexical and phonological dimensions,
/// then runs correlation, regression, ANOVA, tests, PCA, clustering and a
/// q-exponential fit over the scores.
#[derive(Parser)]
#[command(name = "cognata", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a parallel corpus and analyze the scores
    Analyze {
        /// CSV with Idioma, Texto Original and Tradução para o Português Moderno columns
        csv: PathBuf,

        /// Where to write the results table
        #[arg(long, default_value = "output/cognata-results.csv")]
        out: PathBuf,

        /// Where to write the Markdown report
        #[arg(long, default_value = "output/cognata-report.md")]
        report: String,

        /// Also write the full analysis as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Truncate misaligned sentence lists to the shortest instead of failing
        #[arg(long)]
        truncate: bool,

        /// Metric families to compute, in column order
        #[arg(
            long,
            value_delimiter = ',',
            value_parser = parse_family,
            default_value = "semantic,ngram,wordvec,phonological"
        )]
        metrics: Vec<MetricFamily>,

        /// Character n-gram size (overrides COGNATA_NGRAM_SIZE)
        #[arg(long)]
        ngram_size: Option<usize>,

        /// Word-vector dimension (overrides COGNATA_WORD_DIM)
        #[arg(long)]
        word_dim: Option<usize>,

        /// Only compute and save the table; skip the statistical analyses
        #[arg(long)]
        scores_only: bool,

        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Fit a q-exponential curve to one column of a saved results table
    Fit {
        /// Results CSV written by `analyze`
        results: PathBuf,

        /// Column to fit
        #[arg(long)]
        column: String,

        /// Column to use as x (default: row index)
        #[arg(long)]
        covariate: Option<String>,

        /// Iteration cap (overrides COGNATA_FIT_MAX_ITER)
        #[arg(long)]
        max_iter: Option<usize>,

        /// Also write the fit as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Download the sentence-embedding model (~90 MB)
    DownloadModel,

    /// Show model availability and the active configuration
    Status,
}

/// Overrides for the default analysis plan.
#[derive(clap::Args)]
struct PlanArgs {
    /// Response column for regressions (default: first column)
    #[arg(long)]
    response: Option<String>,

    /// Predictor for the simple regression (default: second column)
    #[arg(long)]
    predictor: Option<String>,

    /// Predictors for the multiple regression (default: all other columns)
    #[arg(long, value_delimiter = ',')]
    predictors: Option<Vec<String>>,

    /// PCA components to keep
    #[arg(long)]
    components: Option<usize>,

    /// Clusters for k-means and the dendrogram cut
    #[arg(long)]
    clusters: Option<usize>,

    /// Dendrogram linkage: ward, average, complete or single
    #[arg(long, value_parser = parse_linkage)]
    linkage: Option<Linkage>,

    /// Column for the q-exponential fit (default: first column)
    #[arg(long)]
    qexp_column: Option<String>,

    /// Covariate for the q-exponential fit (default: row index)
    #[arg(long)]
    qexp_covariate: Option<String>,

    /// Significance level (overrides COGNATA_ALPHA)
    #[arg(long)]
    alpha: Option<f64>,

    /// k-means seed (overrides COGNATA_SEED)
    #[arg(long)]
    seed: Option<u64>,
}

impl PlanArgs {
    fn apply(self, plan: &mut AnalysisPlan) {
        if let Some(v) = self.response {
            plan.response = v;
        }
        if let Some(v) = self.predictor {
            plan.predictor = v;
        }
        if let Some(v) = self.predictors {
            plan.predictors = v;
        }
        if let Some(v) = self.components {
            plan.pca_components = v;
        }
        if let Some(v) = self.clusters {
            plan.clusters = v;
        }
        if let Some(v) = self.linkage {
            plan.linkage = v;
        }
        if let Some(v) = self.qexp_column {
            plan.qexp_column = v;
        }
        if self.qexp_covariate.is_some() {
            plan.qexp_covariate = self.qexp_covariate;
        }
        if let Some(v) = self.alpha {
            plan.alpha = v;
        }
        if let Some(v) = self.seed {
            plan.seed = v;
        }
    }
}

fn parse_family(s: &str) -> Result<MetricFamily, String> {
    MetricFamily::from_name(s).ok_or_else(|| {
        format!("unknown metric '{s}' (expected semantic, ngram, wordvec or phonological)")
    })
}

fn parse_linkage(s: &str) -> Result<Linkage, String> {
    Linkage::from_name(s).ok_or_else(|| {
        format!("unknown linkage '{s}' (expected ward, average, complete or single)")
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cognata=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            csv,
            out,
            report,
            json,
            truncate,
            metrics,
            ngram_size,
            word_dim,
            scores_only,
            plan: plan_args,
        } => {
            let mut config = Config::load()?;
            if let Some(n) = ngram_size {
                config.ngram_size = n;
            }
            if let Some(d) = word_dim {
                config.word_dim = d;
            }
            config.validate()?;

            // Keep the first occurrence of each family, in the order given
            let mut families: Vec<MetricFamily> = Vec::new();
            for family in metrics {
                if !families.contains(&family) {
                    families.push(family);
                }
            }

            // Fail on a missing model before reading the corpus
            let encoder = if families.contains(&MetricFamily::Semantic) {
                config.require_model()?;
                let dir = cognata::download::embedding_model_dir(&config.model_dir);
                Some(
                    OnnxSentenceEncoder::load(&dir, config.token_type_ids)?
                        .with_batch_size(config.batch_size),
                )
            } else {
                None
            };

            let mut triples = loader::load_triples(&csv, &config.loader_options())?;
            if !triples.is_aligned() {
                if truncate {
                    triples = triples.truncate_to_shortest();
                } else {
                    triples.require_aligned()?;
                }
            }
            let (b, a, m) = triples.lengths();
            println!(
                "Loaded {} base, {} archaic and {} modern sentences from {}",
                b,
                a,
                m,
                csv.display()
            );

            let semantic = encoder.as_ref().map(|e| SemanticSimilarity::new(e));
            let ngram = NgramSimilarity::new(config.ngram_size);
            let wordvec = WordVectorSimilarity::new(config.word_dim);
            let phonological = PhonologicalSimilarity;

            let mut active: Vec<&dyn SimilarityMetric> = Vec::new();
            for family in &families {
                match family {
                    MetricFamily::Semantic => {
                        if let Some(s) = &semantic {
                            active.push(s);
                        }
                    }
                    MetricFamily::NGram => active.push(&ngram),
                    MetricFamily::WordVector => active.push(&wordvec),
                    MetricFamily::Phonological => active.push(&phonological),
                }
            }

            let labels = config.variety_labels();
            let table = analysis::compute_table(&triples, &active, &labels)?;
            table.write_csv(&out)?;
            cognata::output::terminal::display_table_summary(&table);
            println!("\n{}", format!("Results table saved to: {}", out.display()).bold());

            if scores_only {
                return Ok(());
            }

            let mut plan = AnalysisPlan::for_table(&table, &labels)?;
            plan.alpha = config.alpha;
            plan.seed = config.seed;
            plan.fit_max_iter = config.fit_max_iter;
            plan.kmeans_max_iter = config.kmeans_max_iter;
            plan_args.apply(&mut plan);

            let report_data = analysis::run_all(&table, &plan);
            cognata::output::terminal::display_report(&report_data);

            let report_path =
                cognata::output::markdown::generate_report(&csv, &table, &report_data, &report)?;
            println!(
                "\n{}",
                format!("Markdown report saved to: {report_path}").bold()
            );

            if let Some(path) = json {
                cognata::output::write_json(&path, &report_data)?;
                println!("{}", format!("JSON report saved to: {}", path.display()).bold());
            }

            let failures = report_data.failures();
            if !failures.is_empty() {
                warn!(count = failures.len(), "Some analyses could not run");
            }
        }

        Commands::Fit {
            results,
            column,
            covariate,
            max_iter,
            json,
        } => {
            let config = Config::load()?;
            let table = ResultsTable::read_csv(&results)?;
            let (clean, dropped) = table.drop_incomplete_rows();
            if dropped > 0 {
                warn!(dropped, "Dropped rows with missing scores before fitting");
            }

            let result = cognata::stats::qexp::fit_column(
                &clean,
                &column,
                covariate.as_deref(),
                max_iter.unwrap_or(config.fit_max_iter),
            )?;
            println!("\n{}", "=== Q-exponential fit ===".bold());
            cognata::output::terminal::display_qexp(&result);

            if let Some(path) = json {
                cognata::output::write_json(&path, &result)?;
                println!("{}", format!("JSON saved to: {}", path.display()).bold());
            }
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            info!(dir = %config.model_dir.display(), "Downloading embedding model");
            cognata::download::download_model(&config.model_dir).await?;
            println!("\n{}", "Model download complete.".green().bold());
        }

        Commands::Status => {
            let config = Config::load()?;
            cognata::status::show(&config);
        }
    }

    Ok(())
}
