// Composition tests: verifying that the stages chain together correctly.
//
// These tests exercise the data flow between modules:
//   CSV -> SentenceTriples -> metrics -> ResultsTable -> analyses
// without the embedding model or any network access (results tables are
// written to the system temp directory).

use cognata::analysis::{compute_table, run_all, AnalysisPlan};
use cognata::corpus::loader::{read_triples, LoaderOptions};
use cognata::corpus::triples::VarietyLabels;
use cognata::output::markdown::render_report;
use cognata::similarity::ngram::NgramSimilarity;
use cognata::similarity::phonology::PhonologicalSimilarity;
use cognata::similarity::traits::{MetricFamily, PairScores, SimilarityMetric};
use cognata::similarity::wordvec::WordVectorSimilarity;
use cognata::stats::qexp::{fit_qexp, q_exponential};
use cognata::table::{Column, ResultsTable};

const TWO_PER_GROUP: &str = "Idioma,Texto Original,Tradução para o Português Moderno\n\
    Dzubukuá,dzu kuai bo,a casa grande\n\
    Português Arcaico,a casa grãde,a casa grande\n\
    Dzubukuá,aré padzu,o moço vai\n\
    Português Arcaico,o moço vay,o moço vai\n";

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("cognata-composition-{name}"))
}

// ============================================================
// Chain: CSV -> triples -> metrics -> table
// ============================================================

#[test]
fn two_rows_per_group_yield_two_by_six_table() {
    let triples = read_triples(TWO_PER_GROUP.as_bytes(), &LoaderOptions::default()).unwrap();
    assert!(triples.is_aligned());

    let ngram = NgramSimilarity::default();
    let phon = PhonologicalSimilarity;
    let metrics: [&dyn SimilarityMetric; 2] = [&ngram, &phon];
    let table = compute_table(&triples, &metrics, &VarietyLabels::default()).unwrap();

    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column_count(), 6);
    assert!(!table.has_missing());
    assert_eq!(
        table.column_names(),
        vec![
            "Dzubukuá - Arcaico (N-gramas)",
            "Dzubukuá - Moderno (N-gramas)",
            "Arcaico - Moderno (N-gramas)",
            "Dzubukuá - Arcaico (Fonológica)",
            "Dzubukuá - Moderno (Fonológica)",
            "Arcaico - Moderno (Fonológica)",
        ]
    );

    // Archaic and modern spellings of the same sentence are closer than
    // either is to the base language
    let am = table.column("Arcaico - Moderno (Fonológica)").unwrap();
    let ba = table.column("Dzubukuá - Arcaico (Fonológica)").unwrap();
    assert!(am[0] > ba[0]);
}

#[test]
fn word_vectors_join_the_table_without_nan() {
    let triples = read_triples(TWO_PER_GROUP.as_bytes(), &LoaderOptions::default()).unwrap();
    let wordvec = WordVectorSimilarity::new(4);
    let metrics: [&dyn SimilarityMetric; 1] = [&wordvec];
    let table = compute_table(&triples, &metrics, &VarietyLabels::default()).unwrap();
    assert_eq!(table.column_count(), 3);
    assert!(!table.has_missing());
}

#[test]
fn missing_column_fails_before_scoring() {
    let csv = "Idioma,Texto Original\nDzubukuá,dzu\n";
    let err = read_triples(csv.as_bytes(), &LoaderOptions::default())
        .unwrap_err()
        .to_string();
    assert!(err.contains("Tradução para o Português Moderno"), "got: {err}");
}

#[test]
fn empty_archaic_language_is_rejected_by_the_aggregator() {
    let csv = "Idioma,Texto Original,Tradução para o Português Moderno\n\
        Dzubukuá,dzu,casa\n\
        Dzubukuá,kuai,rio\n";
    let triples = read_triples(csv.as_bytes(), &LoaderOptions::default()).unwrap();
    assert!(triples.archaic.is_empty());

    let ngram = NgramSimilarity::default();
    let metrics: [&dyn SimilarityMetric; 1] = [&ngram];
    let err = compute_table(&triples, &metrics, &VarietyLabels::default())
        .unwrap_err()
        .to_string();
    assert!(err.contains("mismatch"), "got: {err}");
}

#[test]
fn misaligned_triples_truncate_on_request() {
    let csv = format!("{TWO_PER_GROUP}Dzubukuá,bo bo,outra frase\n");
    let triples = read_triples(csv.as_bytes(), &LoaderOptions::default()).unwrap();
    assert!(!triples.is_aligned());
    assert!(triples.require_aligned().is_err());

    let triples = triples.truncate_to_shortest();
    assert_eq!(triples.lengths(), (2, 2, 2));
}

// ============================================================
// Aggregator and CSV round trip
// ============================================================

#[test]
fn aggregator_rejects_three_versus_four() {
    let scores = PairScores {
        family: MetricFamily::NGram,
        base_archaic: vec![0.1, 0.2, 0.3],
        base_modern: vec![0.1, 0.2, 0.3, 0.4],
        archaic_modern: vec![0.1, 0.2, 0.3],
    };
    let err = ResultsTable::from_pair_scores(&[scores], &VarietyLabels::default())
        .unwrap_err()
        .to_string();
    assert!(err.contains('3') && err.contains('4'), "got: {err}");
}

#[test]
fn csv_round_trip_preserves_names_and_values() {
    let original = ResultsTable::new(vec![
        Column {
            name: "Dzubukuá - Arcaico (Semântica)".to_string(),
            values: vec![0.123456789012345, -0.5, 1.0],
        },
        Column {
            name: "Arcaico - Moderno (Fonológica)".to_string(),
            values: vec![1.0 / 3.0, 0.0, 0.987654321],
        },
    ])
    .unwrap();

    let path = temp_path("roundtrip.csv");
    original.write_csv(&path).unwrap();
    let restored = ResultsTable::read_csv(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(restored, original);
}

// ============================================================
// Chain: table -> analyses -> report
// ============================================================

#[test]
fn analyses_run_on_a_computed_table() {
    let mut csv = String::from("Idioma,Texto Original,Tradução para o Português Moderno\n");
    let rows = [
        ("dzu kuai bo", "a casa grãde", "a casa grande"),
        ("aré padzu", "o moço vay", "o moço vai"),
        ("kuai kuai dzu", "fremosa senhora", "formosa senhora"),
        ("bo aré", "o rio larguo", "o rio largo"),
        ("padzu bo kuai", "hũa cousa", "uma coisa"),
        ("dzu dzu", "muyto bem", "muito bem"),
    ];
    for (base, archaic, modern) in rows {
        csv.push_str(&format!("Dzubukuá,{base},{modern}\n"));
        csv.push_str(&format!("Português Arcaico,{archaic},{modern}\n"));
    }

    let triples = read_triples(csv.as_bytes(), &LoaderOptions::default()).unwrap();
    let labels = VarietyLabels::default();
    let ngram = NgramSimilarity::default();
    let phon = PhonologicalSimilarity;
    let metrics: [&dyn SimilarityMetric; 2] = [&ngram, &phon];
    let table = compute_table(&triples, &metrics, &labels).unwrap();

    let plan = AnalysisPlan::for_table(&table, &labels).unwrap();
    assert_eq!(
        plan.anova_families,
        vec![MetricFamily::NGram, MetricFamily::Phonological]
    );

    let report = run_all(&table, &plan);
    assert_eq!(report.rows, 6);
    assert_eq!(report.anova.len(), 2);
    assert!(report.correlation.is_ok());
    assert!(report.pca.is_ok());
    assert!(report.kmeans.is_ok());

    // Serializes cleanly even with NaN entries
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"correlation\""));

    let md = render_report(std::path::Path::new("corpus.csv"), &table, &report);
    assert!(md.contains("Arcaico - Moderno (N-gramas)"));
}

// ============================================================
// Q-exponential recovery
// ============================================================

#[test]
fn qexp_recovers_known_parameters_within_one_percent() {
    let x: Vec<f64> = (0..=24).map(|i| i as f64 * 0.25).collect();
    let y: Vec<f64> = x.iter().map(|&xi| q_exponential(xi, 2.0, 0.5, 0.7)).collect();

    let (a, b, q) = fit_qexp(&x, &y, 500).params().expect("fit should converge");
    assert!((a - 2.0).abs() <= 0.02, "a = {a}");
    assert!((b - 0.5).abs() <= 0.005, "b = {b}");
    assert!((q - 0.7).abs() <= 0.007, "q = {q}");
}
