// Unit tests for the similarity metrics through their public API.
//
// Every family must score identical text as (near) identical, keep its
// documented range, and return one score per matched sentence pair.

use anyhow::Result;
use cognata::corpus::triples::{LanguagePair, SentenceTriples};
use cognata::similarity::embeddings::{mean_pool, SentenceEncoder};
use cognata::similarity::ngram::NgramSimilarity;
use cognata::similarity::phonology::{transcribe, PhonologicalSimilarity};
use cognata::similarity::semantic::SemanticSimilarity;
use cognata::similarity::traits::{MetricFamily, SimilarityMetric};
use cognata::similarity::wordvec::WordVectorSimilarity;

/// Bag-of-letters encoder: enough structure for cosine to mean something.
struct LetterCounts;

impl SentenceEncoder for LetterCounts {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; 26];
                for c in t.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                    v[(c as u8 - b'a') as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn corpus() -> SentenceTriples {
    SentenceTriples::new(
        strings(&["dzu kuai bo", "aré padzu", "kuai kuai"]),
        strings(&["a casa grãde do rio", "o moço vai", "fremosa senhora"]),
        strings(&["a casa grande do rio", "o moço vai", "formosa senhora"]),
    )
}

// ============================================================
// Identity and range
// ============================================================

#[test]
fn every_family_scores_identical_text_near_one() {
    let encoder = LetterCounts;
    let semantic = SemanticSimilarity::new(&encoder);
    let ngram = NgramSimilarity::default();
    let wordvec = WordVectorSimilarity::default();
    let phon = PhonologicalSimilarity;
    let metrics: [&dyn SimilarityMetric; 4] = [&semantic, &ngram, &wordvec, &phon];

    let texts = strings(&["a casa grande do rio", "o moço vai embora", "senhora"]);
    for metric in metrics {
        let scores = metric.score_aligned(&texts, &texts).unwrap();
        assert_eq!(scores.len(), 3);
        for s in scores {
            assert!(s >= 0.99, "{} scored identical text {s}", metric.family());
        }
    }
}

#[test]
fn every_family_stays_in_its_range() {
    let encoder = LetterCounts;
    let semantic = SemanticSimilarity::new(&encoder);
    let ngram = NgramSimilarity::default();
    let wordvec = WordVectorSimilarity::new(8);
    let phon = PhonologicalSimilarity;
    let metrics: [&dyn SimilarityMetric; 4] = [&semantic, &ngram, &wordvec, &phon];

    let triples = corpus();
    for metric in metrics {
        let (lo, hi) = metric.family().range();
        let scores = metric.compare(&triples).unwrap();
        for pair in LanguagePair::ALL {
            let values = scores.get(pair);
            assert_eq!(values.len(), 3, "{} {:?}", metric.family(), pair);
            for v in values {
                assert!(
                    *v >= lo - 1e-9 && *v <= hi + 1e-9,
                    "{} score {v} outside [{lo}, {hi}]",
                    metric.family()
                );
            }
        }
    }
}

// ============================================================
// Alignment and empty input
// ============================================================

#[test]
fn score_length_is_the_shorter_list() {
    let ngram = NgramSimilarity::default();
    let scores = ngram
        .score_aligned(&strings(&["a", "b", "c"]), &strings(&["a", "b"]))
        .unwrap();
    assert_eq!(scores.len(), 2);
}

#[test]
fn empty_language_gives_empty_arrays() {
    let triples = SentenceTriples::new(
        strings(&["dzu", "kuai"]),
        Vec::new(),
        strings(&["rio", "mar"]),
    );
    let phon = PhonologicalSimilarity;
    let scores = phon.compare(&triples).unwrap();
    assert!(scores.get(LanguagePair::BaseArchaic).is_empty());
    assert!(scores.get(LanguagePair::ArchaicModern).is_empty());
    assert_eq!(scores.get(LanguagePair::BaseModern).len(), 2);
}

#[test]
fn semantic_compare_matches_pairwise_scoring() {
    let encoder = LetterCounts;
    let semantic = SemanticSimilarity::new(&encoder);
    let triples = corpus();
    let together = semantic.compare(&triples).unwrap();
    let (a, b) = triples.pair(LanguagePair::ArchaicModern);
    let separate = semantic.score_aligned(a, b).unwrap();
    for (x, y) in together.get(LanguagePair::ArchaicModern).iter().zip(&separate) {
        assert!((x - y).abs() < 1e-12);
    }
    assert_eq!(together.family, MetricFamily::Semantic);
}

// ============================================================
// Metric-specific behavior
// ============================================================

#[test]
fn ngram_orders_by_surface_overlap() {
    let ngram = NgramSimilarity::default();
    let close = ngram.similarity("casa grãde", "casa grande");
    let far = ngram.similarity("casa grãde", "senhora");
    assert!(close > far, "close {close} vs far {far}");
}

#[test]
fn phonological_ignores_spelling_only_differences() {
    // Nasal tilde vs vowel + n before a consonant sound the same
    let phon = PhonologicalSimilarity;
    assert!((phon.similarity("casa grãde", "casa grande") - 1.0).abs() < 1e-12);
    assert!(phon.similarity("fremosa", "formosa") < 1.0);
    assert!(!transcribe("chave").is_empty());
}

#[test]
fn mean_pool_respects_padding_mask() {
    // One sentence, two real tokens and one padding token, dim 2
    let hidden = [1.0f32, 0.0, 3.0, 0.0, 100.0, 100.0];
    let mask = [1i64, 1, 0];
    let pooled = mean_pool(&hidden, &mask, 1, 3, 2);
    assert_eq!(pooled.len(), 1);
    // Mean (2, 0), normalized to (1, 0)
    assert!((pooled[0][0] - 1.0).abs() < 1e-9);
    assert!(pooled[0][1].abs() < 1e-9);
}
