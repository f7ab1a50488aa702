// Semantic similarity: matched-index cosine of sentence embeddings.
//
// All sentences of a run are encoded in one pass through the shared encoder,
// then sentence i of one variety is compared with sentence i of the other.
// Only the diagonal of the pairwise matrix is ever computed.

use anyhow::Result;
use tracing::info;

use super::embeddings::SentenceEncoder;
use super::traits::{cosine_similarity, MetricFamily, PairScores, SimilarityMetric};
use crate::corpus::triples::SentenceTriples;

/// Semantic similarity over a borrowed, already-loaded encoder.
pub struct SemanticSimilarity<'a> {
    encoder: &'a dyn SentenceEncoder,
}

impl<'a> SemanticSimilarity<'a> {
    pub fn new(encoder: &'a dyn SentenceEncoder) -> Self {
        Self { encoder }
    }
}

impl SimilarityMetric for SemanticSimilarity<'_> {
    fn family(&self) -> MetricFamily {
        MetricFamily::Semantic
    }

    fn score_aligned(&self, a: &[String], b: &[String]) -> Result<Vec<f64>> {
        let n = a.len().min(b.len());
        if n == 0 {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = a[..n].iter().chain(b[..n].iter()).cloned().collect();
        let embeddings = encode_checked(self.encoder, &texts)?;
        Ok(diagonal_cosine(&embeddings[..n], &embeddings[n..]))
    }

    fn compare(&self, triples: &SentenceTriples) -> Result<PairScores> {
        let texts: Vec<String> = triples.all_sentences().cloned().collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            encode_checked(self.encoder, &texts)?
        };

        let (nb, na, _) = triples.lengths();
        let base = &embeddings[..nb];
        let archaic = &embeddings[nb..nb + na];
        let modern = &embeddings[nb + na..];

        info!(sentences = texts.len(), "Encoded sentences for semantic similarity");

        Ok(PairScores {
            family: MetricFamily::Semantic,
            base_archaic: diagonal_cosine(base, archaic),
            base_modern: diagonal_cosine(base, modern),
            archaic_modern: diagonal_cosine(archaic, modern),
        })
    }
}

fn encode_checked(encoder: &dyn SentenceEncoder, texts: &[String]) -> Result<Vec<Vec<f64>>> {
    let embeddings = encoder.encode(texts)?;
    if embeddings.len() != texts.len() {
        anyhow::bail!(
            "Encoder returned {} embeddings for {} sentences",
            embeddings.len(),
            texts.len()
        );
    }
    Ok(embeddings)
}

/// Cosine of row i of `a` with row i of `b`, for the shorter length.
pub fn diagonal_cosine(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<f64> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| cosine_similarity(x, y))
        .collect()
}
