// Word-vector lexical similarity.
//
// A second lexical signal, independent of the sentence-transformer model:
// word vectors are trained on the sentences of the run itself. Symmetric
// co-occurrence counts inside a small window are turned into a positive PMI
// matrix, whose leading eigenvectors (scaled by the square root of their
// eigenvalues) give each word a dense vector. This is the count-based
// counterpart of skip-gram word2vec and needs no pretrained model, which
// matters for a base language no pretrained model has ever seen.
//
// A sentence vector is the TF-IDF weighted mean of its word vectors. Two
// sentence vectors are compared with cosine, so scores fall in [-1, 1].

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use keyword_extraction::tf_idf::{TfIdf, TfIdfParams};
use nalgebra::{DMatrix, SymmetricEigen};
use stop_words::{get, LANGUAGE};
use tracing::debug;

use super::text::{normalize, tokenize};
use super::traits::{cosine_similarity, MetricFamily, PairScores, SimilarityMetric};
use crate::corpus::triples::{LanguagePair, SentenceTriples};

/// Settings for training word vectors on the run's corpus.
pub struct WordVectorSimilarity {
    /// Dimensions kept per word vector
    pub dim: usize,
    /// Words on each side that count as co-occurring
    pub window: usize,
    /// Vocabulary cap (most frequent words kept)
    pub max_vocab: usize,
    /// Drop Portuguese stop words before training and scoring
    pub drop_stop_words: bool,
}

impl Default for WordVectorSimilarity {
    fn default() -> Self {
        Self {
            dim: 50,
            window: 2,
            max_vocab: 1000,
            drop_stop_words: true,
        }
    }
}

impl WordVectorSimilarity {
    pub fn new(dim: usize) -> Self {
        Self {
            dim: dim.max(1),
            ..Self::default()
        }
    }

    fn stop_words(&self) -> Vec<String> {
        if self.drop_stop_words {
            get(LANGUAGE::Portuguese)
        } else {
            Vec::new()
        }
    }

    /// Train word vectors on the given sentences.
    pub fn train(&self, sentences: &[String]) -> WordVectors {
        WordVectors::train(sentences, self.dim, self.window, self.max_vocab, &self.stop_words())
    }
}

impl SimilarityMetric for WordVectorSimilarity {
    fn family(&self) -> MetricFamily {
        MetricFamily::WordVector
    }

    fn score_aligned(&self, a: &[String], b: &[String]) -> Result<Vec<f64>> {
        let n = a.len().min(b.len());
        if n == 0 {
            return Ok(Vec::new());
        }
        let corpus: Vec<String> = a[..n].iter().chain(b[..n].iter()).cloned().collect();
        let vectors = self.train(&corpus);
        Ok(vectors.score_aligned(&a[..n], &b[..n]))
    }

    fn compare(&self, triples: &SentenceTriples) -> Result<PairScores> {
        let corpus: Vec<String> = triples.all_sentences().cloned().collect();
        let vectors = self.train(&corpus);
        let score = |pair| {
            let (a, b) = triples.pair(pair);
            vectors.score_aligned(a, b)
        };
        Ok(PairScores {
            family: MetricFamily::WordVector,
            base_archaic: score(LanguagePair::BaseArchaic),
            base_modern: score(LanguagePair::BaseModern),
            archaic_modern: score(LanguagePair::ArchaicModern),
        })
    }
}

/// Word vectors trained on one corpus, plus the TF-IDF weights used to
/// average them into sentence vectors.
pub struct WordVectors {
    index: HashMap<String, usize>,
    vectors: Vec<Vec<f64>>,
    weights: HashMap<String, f64>,
    default_weight: f64,
    stop_words: HashSet<String>,
}

impl WordVectors {
    pub fn train(
        sentences: &[String],
        dim: usize,
        window: usize,
        max_vocab: usize,
        stop_words: &[String],
    ) -> Self {
        let stop_set: HashSet<String> = stop_words.iter().cloned().collect();
        let docs: Vec<Vec<String>> = sentences
            .iter()
            .map(|s| content_tokens(s, &stop_set))
            .collect();

        // Vocabulary: most frequent words first, ties alphabetical.
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            for w in doc {
                *counts.entry(w.as_str()).or_insert(0) += 1;
            }
        }
        let mut vocab: Vec<(&str, usize)> = counts.into_iter().collect();
        vocab.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        vocab.truncate(max_vocab);

        let index: HashMap<String, usize> = vocab
            .iter()
            .enumerate()
            .map(|(i, (w, _))| (w.to_string(), i))
            .collect();

        let vectors = embed_vocabulary(&docs, &index, dim, window);
        let (weights, default_weight) = tfidf_weights(sentences, stop_words);

        debug!(
            vocab = index.len(),
            dim = vectors.first().map(Vec::len).unwrap_or(0),
            "Trained corpus word vectors"
        );

        Self {
            index,
            vectors,
            weights,
            default_weight,
            stop_words: stop_set,
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.index.len()
    }

    pub fn word_vector(&self, word: &str) -> Option<&[f64]> {
        self.index.get(word).map(|&i| self.vectors[i].as_slice())
    }

    /// TF-IDF weighted mean of the sentence's word vectors.
    ///
    /// None when no word is in the vocabulary or the mean is the zero vector.
    pub fn sentence_vector(&self, text: &str) -> Option<Vec<f64>> {
        let dim = self.vectors.first().map(Vec::len)?;
        let mut sum = vec![0.0; dim];
        let mut total_weight = 0.0;

        for token in content_tokens(text, &self.stop_words) {
            if let Some(v) = self.word_vector(&token) {
                let w = self.weights.get(&token).copied().unwrap_or(self.default_weight);
                for (acc, x) in sum.iter_mut().zip(v) {
                    *acc += w * x;
                }
                total_weight += w;
            }
        }

        if total_weight <= 0.0 {
            return None;
        }
        for x in &mut sum {
            *x /= total_weight;
        }
        if sum.iter().all(|x| x.abs() < 1e-12) {
            return None;
        }
        Some(sum)
    }

    /// Similarity of two sentences.
    ///
    /// Falls back to token-set Jaccard when either side has no usable
    /// vector, so identical texts still score 1.0.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        match (self.sentence_vector(a), self.sentence_vector(b)) {
            (Some(va), Some(vb)) => cosine_similarity(&va, &vb),
            _ => token_jaccard(a, b, &self.stop_words),
        }
    }

    pub fn score_aligned(&self, a: &[String], b: &[String]) -> Vec<f64> {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| self.similarity(x, y))
            .collect()
    }
}

fn content_tokens(text: &str, stop_words: &HashSet<String>) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !stop_words.contains(t))
        .collect()
}

/// Positive PMI over windowed co-occurrences, reduced to `dim` dimensions.
fn embed_vocabulary(
    docs: &[Vec<String>],
    index: &HashMap<String, usize>,
    dim: usize,
    window: usize,
) -> Vec<Vec<f64>> {
    let v = index.len();
    if v == 0 {
        return Vec::new();
    }

    let mut cooc = DMatrix::<f64>::zeros(v, v);
    for doc in docs {
        let ids: Vec<usize> = doc.iter().filter_map(|w| index.get(w).copied()).collect();
        for (pos, &i) in ids.iter().enumerate() {
            for &j in ids.iter().skip(pos + 1).take(window) {
                cooc[(i, j)] += 1.0;
                cooc[(j, i)] += 1.0;
            }
        }
    }

    let total: f64 = cooc.sum();
    let row_sums: Vec<f64> = (0..v).map(|i| cooc.row(i).sum()).collect();

    let mut ppmi = DMatrix::<f64>::zeros(v, v);
    if total > 0.0 {
        for i in 0..v {
            for j in 0..v {
                let c = cooc[(i, j)];
                if c > 0.0 {
                    let pmi = (c * total / (row_sums[i] * row_sums[j])).ln();
                    ppmi[(i, j)] = pmi.max(0.0);
                }
            }
        }
    }

    let eigen = SymmetricEigen::new(ppmi);
    let mut order: Vec<usize> = (0..v).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let kept: Vec<usize> = order
        .into_iter()
        .filter(|&k| eigen.eigenvalues[k] > 1e-12)
        .take(dim)
        .collect();

    (0..v)
        .map(|i| {
            kept.iter()
                .map(|&k| eigen.eigenvectors[(i, k)] * eigen.eigenvalues[k].sqrt())
                .collect()
        })
        .collect()
}

/// TF-IDF scores per word, treating each sentence as a document.
///
/// Returns the score map and the mean score, used for words the extractor
/// did not score.
fn tfidf_weights(sentences: &[String], stop_words: &[String]) -> (HashMap<String, f64>, f64) {
    let distinct: HashSet<String> = sentences.iter().flat_map(|s| tokenize(s)).collect();
    if distinct.is_empty() {
        return (HashMap::new(), 1.0);
    }

    let params = TfIdfParams::UnprocessedDocuments(sentences, stop_words, None);
    let tfidf = TfIdf::new(params);
    let weights: HashMap<String, f64> = tfidf
        .get_ranked_word_scores(distinct.len())
        .into_iter()
        .filter(|(_, s)| s.is_finite() && *s > 0.0)
        .map(|(w, s)| (w, s as f64))
        .collect();

    let default_weight = if weights.is_empty() {
        1.0
    } else {
        weights.values().sum::<f64>() / weights.len() as f64
    };
    (weights, default_weight)
}

fn token_jaccard(a: &str, b: &str, stop_words: &HashSet<String>) -> f64 {
    let set_a: HashSet<String> = content_tokens(a, stop_words).into_iter().collect();
    let set_b: HashSet<String> = content_tokens(b, stop_words).into_iter().collect();

    if set_a.is_empty() && set_b.is_empty() {
        return if normalize(a) == normalize(b) { 1.0 } else { 0.0 };
    }
    let inter = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    inter / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        [
            "o rio corre para o mar",
            "o rio largo corre devagar",
            "a casa grande fica perto do rio",
            "a casa pequena fica longe do mar",
            "o mar grande bate na praia",
            "a praia fica perto da casa",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn test_training_builds_vectors_for_vocabulary() {
        let metric = WordVectorSimilarity::default();
        let vectors = metric.train(&corpus());
        assert!(vectors.vocabulary_size() > 5);
        assert!(vectors.word_vector("rio").is_some());
        // stop words never enter the vocabulary
        assert!(vectors.word_vector("o").is_none());
    }

    #[test]
    fn test_identical_sentence_scores_one() {
        let vectors = WordVectorSimilarity::default().train(&corpus());
        let s = vectors.similarity("o rio corre para o mar", "o rio corre para o mar");
        assert!(s >= 0.99, "got {s}");
    }

    #[test]
    fn test_single_word_identity_uses_fallback() {
        let metric = WordVectorSimilarity::default();
        let scores = metric
            .score_aligned(&["casa".to_string()], &["casa".to_string()])
            .unwrap();
        assert!(scores[0] >= 0.99, "got {}", scores[0]);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let metric = WordVectorSimilarity::default();
        let c = corpus();
        let scores = metric.score_aligned(&c[..3], &c[3..]).unwrap();
        assert_eq!(scores.len(), 3);
        for s in scores {
            assert!((-1.0..=1.0).contains(&s), "out of range: {s}");
        }
    }

    #[test]
    fn test_empty_side_gives_empty_scores() {
        let metric = WordVectorSimilarity::default();
        assert!(metric.score_aligned(&corpus(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_jaccard_fallback() {
        let stop: HashSet<String> = HashSet::new();
        assert!((token_jaccard("a b", "b c", &stop) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(token_jaccard("", "", &stop), 1.0);
    }
}
