// Similarity metric trait: every metric family plugs in here.
//
// A metric scores matched-index sentence pairs: sentence i of one variety is
// compared only with sentence i of the other. The pipeline never needs to
// know which family it is running beyond the column label.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::corpus::triples::{LanguagePair, SentenceTriples};

/// The metric families that produce result columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricFamily {
    /// Sentence-transformer embeddings, cosine in [-1, 1]
    Semantic,
    /// Character n-gram count vectors, cosine in [0, 1]
    NGram,
    /// Corpus-trained word vectors, cosine in [-1, 1]
    WordVector,
    /// Normalized phoneme edit distance, similarity in [0, 1]
    Phonological,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 4] = [
        MetricFamily::Semantic,
        MetricFamily::NGram,
        MetricFamily::WordVector,
        MetricFamily::Phonological,
    ];

    /// Label used inside result column names.
    pub fn label(self) -> &'static str {
        match self {
            MetricFamily::Semantic => "Semântica",
            MetricFamily::NGram => "N-gramas",
            MetricFamily::WordVector => "Word2Vec",
            MetricFamily::Phonological => "Fonológica",
        }
    }

    /// Inclusive range every score of this family falls in.
    pub fn range(self) -> (f64, f64) {
        match self {
            MetricFamily::Semantic | MetricFamily::WordVector => (-1.0, 1.0),
            MetricFamily::NGram | MetricFamily::Phonological => (0.0, 1.0),
        }
    }

    /// Parse a CLI name ("semantic", "ngram", "wordvec", "phonological").
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "semantic" | "semantica" => Some(MetricFamily::Semantic),
            "ngram" | "ngrams" | "n-gram" => Some(MetricFamily::NGram),
            "wordvec" | "word2vec" | "word-vector" => Some(MetricFamily::WordVector),
            "phonological" | "phonology" | "fonologica" => Some(MetricFamily::Phonological),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Scores of one metric family for the three language pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairScores {
    pub family: MetricFamily,
    pub base_archaic: Vec<f64>,
    pub base_modern: Vec<f64>,
    pub archaic_modern: Vec<f64>,
}

impl PairScores {
    pub fn get(&self, pair: LanguagePair) -> &[f64] {
        match pair {
            LanguagePair::BaseArchaic => &self.base_archaic,
            LanguagePair::BaseModern => &self.base_modern,
            LanguagePair::ArchaicModern => &self.archaic_modern,
        }
    }
}

/// Trait for a similarity metric over aligned sentence pairs.
pub trait SimilarityMetric {
    fn family(&self) -> MetricFamily;

    /// Score sentence i of `a` against sentence i of `b`.
    ///
    /// Returns `min(a.len(), b.len())` scores; an empty side gives an empty
    /// result rather than an error.
    fn score_aligned(&self, a: &[String], b: &[String]) -> Result<Vec<f64>>;

    /// Score all three language pairs of a run.
    ///
    /// Metrics that need the whole corpus up front (shared encoding, trained
    /// vectors) override this.
    fn compare(&self, triples: &SentenceTriples) -> Result<PairScores> {
        let score = |pair| {
            let (a, b) = triples.pair(pair);
            self.score_aligned(a, b)
        };
        Ok(PairScores {
            family: self.family(),
            base_archaic: score(LanguagePair::BaseArchaic)?,
            base_modern: score(LanguagePair::BaseModern)?,
            archaic_modern: score(LanguagePair::ArchaicModern)?,
        })
    }
}

/// Cosine similarity between two vectors, clamped to [-1, 1].
///
/// Mismatched dimensions, empty input, or a zero vector give 0.0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    let denom = mag_a * mag_b;
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_opposite_is_negative() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_family_names_parse() {
        assert_eq!(MetricFamily::from_name("NGram"), Some(MetricFamily::NGram));
        assert_eq!(MetricFamily::from_name("word2vec"), Some(MetricFamily::WordVector));
        assert_eq!(MetricFamily::from_name("nope"), None);
    }
}
