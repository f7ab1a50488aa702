// Character n-gram similarity.
//
// Each sentence becomes a bag of overlapping character n-grams taken from
// its normalized form padded with one space on each side, so word edges
// count as context ("casa" -> " ca", "cas", "asa", "sa "). Two bags are
// compared with cosine over their counts, which stays in [0, 1].

use std::collections::HashMap;

use anyhow::Result;

use super::text::normalize;
use super::traits::{MetricFamily, SimilarityMetric};

/// N-gram overlap metric.
pub struct NgramSimilarity {
    /// Characters per n-gram
    pub n: usize,
}

impl Default for NgramSimilarity {
    fn default() -> Self {
        Self { n: 3 }
    }
}

impl NgramSimilarity {
    pub fn new(n: usize) -> Self {
        Self { n: n.max(1) }
    }

    /// Similarity of two sentences in [0, 1].
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let norm_a = normalize(a);
        let norm_b = normalize(b);
        let grams_a = char_ngrams(&norm_a, self.n);
        let grams_b = char_ngrams(&norm_b, self.n);

        if grams_a.is_empty() || grams_b.is_empty() {
            // Too short to form any n-gram: only exact equality counts.
            return if norm_a == norm_b { 1.0 } else { 0.0 };
        }

        count_cosine(&grams_a, &grams_b)
    }
}

impl SimilarityMetric for NgramSimilarity {
    fn family(&self) -> MetricFamily {
        MetricFamily::NGram
    }

    fn score_aligned(&self, a: &[String], b: &[String]) -> Result<Vec<f64>> {
        Ok(a.iter()
            .zip(b.iter())
            .map(|(x, y)| self.similarity(x, y))
            .collect())
    }
}

/// Count the character n-grams of already-normalized text.
pub fn char_ngrams(normalized: &str, n: usize) -> HashMap<String, usize> {
    let mut grams = HashMap::new();
    if normalized.is_empty() {
        return grams;
    }

    let padded: Vec<char> = std::iter::once(' ')
        .chain(normalized.chars())
        .chain(std::iter::once(' '))
        .collect();

    for window in padded.windows(n) {
        *grams.entry(window.iter().collect::<String>()).or_insert(0) += 1;
    }
    grams
}

fn count_cosine(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(gram, &ca)| b.get(gram).map(|&cb| (ca * cb) as f64))
        .sum();
    let norm = |m: &HashMap<String, usize>| m.values().map(|&c| (c * c) as f64).sum::<f64>().sqrt();

    let denom = norm(a) * norm(b);
    if denom < f64::EPSILON {
        0.0
    } else {
        // Disjoint n-gram sets sum to -0.0
        (dot / denom).clamp(0.0, 1.0) + 0.0
    }
}
