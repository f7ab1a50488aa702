// Sentence triples: the three aligned sentence sequences of one run.
//
// Sentence i of each sequence is assumed to be a translation of the same
// source. Nothing upstream guarantees that, so alignment is checked here
// and ragged input is only truncated when the caller asks for it.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One of the three language varieties in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variety {
    /// The extinct/reconstructed base language
    Base,
    /// The older historical register of the modern language
    Archaic,
    /// The contemporary translation target
    Modern,
}

/// Display names for the three varieties, used to build column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarietyLabels {
    pub base: String,
    pub archaic: String,
    pub modern: String,
}

impl Default for VarietyLabels {
    fn default() -> Self {
        Self {
            base: "Dzubukuá".to_string(),
            archaic: "Arcaico".to_string(),
            modern: "Moderno".to_string(),
        }
    }
}

impl VarietyLabels {
    pub fn get(&self, variety: Variety) -> &str {
        match variety {
            Variety::Base => &self.base,
            Variety::Archaic => &self.archaic,
            Variety::Modern => &self.modern,
        }
    }
}

/// An unordered pair of varieties compared by every similarity metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguagePair {
    BaseArchaic,
    BaseModern,
    ArchaicModern,
}

impl LanguagePair {
    /// Column order used by the results table.
    pub const ALL: [LanguagePair; 3] = [
        LanguagePair::BaseArchaic,
        LanguagePair::BaseModern,
        LanguagePair::ArchaicModern,
    ];

    pub fn varieties(self) -> (Variety, Variety) {
        match self {
            LanguagePair::BaseArchaic => (Variety::Base, Variety::Archaic),
            LanguagePair::BaseModern => (Variety::Base, Variety::Modern),
            LanguagePair::ArchaicModern => (Variety::Archaic, Variety::Modern),
        }
    }

    /// Human-readable label, e.g. "Dzubukuá - Arcaico".
    pub fn label(self, labels: &VarietyLabels) -> String {
        let (a, b) = self.varieties();
        format!("{} - {}", labels.get(a), labels.get(b))
    }
}

/// The three sentence sequences of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentenceTriples {
    pub base: Vec<String>,
    pub archaic: Vec<String>,
    pub modern: Vec<String>,
}

impl SentenceTriples {
    pub fn new(base: Vec<String>, archaic: Vec<String>, modern: Vec<String>) -> Self {
        Self {
            base,
            archaic,
            modern,
        }
    }

    pub fn get(&self, variety: Variety) -> &[String] {
        match variety {
            Variety::Base => &self.base,
            Variety::Archaic => &self.archaic,
            Variety::Modern => &self.modern,
        }
    }

    /// Both sides of a language pair, in pair order.
    pub fn pair(&self, pair: LanguagePair) -> (&[String], &[String]) {
        let (a, b) = pair.varieties();
        (self.get(a), self.get(b))
    }

    /// Lengths as (base, archaic, modern).
    pub fn lengths(&self) -> (usize, usize, usize) {
        (self.base.len(), self.archaic.len(), self.modern.len())
    }

    /// True when all three sequences have the same length.
    pub fn is_aligned(&self) -> bool {
        let (b, a, m) = self.lengths();
        b == a && a == m
    }

    /// Number of fully aligned rows (shortest sequence).
    pub fn aligned_len(&self) -> usize {
        let (b, a, m) = self.lengths();
        b.min(a).min(m)
    }

    /// Fail unless every sequence has the same length.
    pub fn require_aligned(&self) -> anyhow::Result<()> {
        if !self.is_aligned() {
            let (b, a, m) = self.lengths();
            anyhow::bail!(
                "Sentence sequences are not aligned (base: {b}, archaic: {a}, modern: {m}).\n\
                 Fix the dataset or pass --truncate to drop the unmatched tail explicitly."
            );
        }
        Ok(())
    }

    /// Drop trailing sentences so all three sequences share the shortest length.
    pub fn truncate_to_shortest(mut self) -> Self {
        let n = self.aligned_len();
        if !self.is_aligned() {
            let (b, a, m) = self.lengths();
            warn!(
                base = b,
                archaic = a,
                modern = m,
                kept = n,
                "Truncating ragged sentence sequences"
            );
        }
        self.base.truncate(n);
        self.archaic.truncate(n);
        self.modern.truncate(n);
        self
    }

    /// Every sentence of the run, base then archaic then modern.
    pub fn all_sentences(&self) -> impl Iterator<Item = &String> {
        self.base
            .iter()
            .chain(self.archaic.iter())
            .chain(self.modern.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pair_labels() {
        let labels = VarietyLabels::default();
        assert_eq!(LanguagePair::BaseArchaic.label(&labels), "Dzubukuá - Arcaico");
        assert_eq!(LanguagePair::BaseModern.label(&labels), "Dzubukuá - Moderno");
        assert_eq!(LanguagePair::ArchaicModern.label(&labels), "Arcaico - Moderno");
    }

    #[test]
    fn test_aligned_detection() {
        let t = SentenceTriples::new(
            strings(&["a", "b"]),
            strings(&["c", "d"]),
            strings(&["e", "f"]),
        );
        assert!(t.is_aligned());
        assert!(t.require_aligned().is_ok());
    }

    #[test]
    fn test_ragged_is_rejected_then_truncated() {
        let t = SentenceTriples::new(
            strings(&["a", "b", "x"]),
            strings(&["c", "d"]),
            strings(&["e", "f"]),
        );
        let err = t.require_aligned().unwrap_err().to_string();
        assert!(err.contains("base: 3"), "unexpected message: {err}");

        let t = t.truncate_to_shortest();
        assert!(t.is_aligned());
        assert_eq!(t.base, strings(&["a", "b"]));
    }

    #[test]
    fn test_pair_returns_both_sides() {
        let t = SentenceTriples::new(strings(&["a"]), strings(&["b"]), strings(&["c"]));
        let (left, right) = t.pair(LanguagePair::ArchaicModern);
        assert_eq!(left, &["b".to_string()][..]);
        assert_eq!(right, &["c".to_string()][..]);
    }
}
