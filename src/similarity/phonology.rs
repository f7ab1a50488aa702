// Phonological similarity.
//
// Sentences are transcribed into phoneme segments with orthographic rules for
// Portuguese-style spelling, which both the archaic and modern registers use
// and which the base-language transcriptions in the dataset follow as well.
// The rules cover the digraphs (ch, lh, nh, rr, ss, qu, gu), soft c and g,
// nasal vowels (ã, õ, and vowel + m/n before a consonant), silent h,
// intervocalic s, ç, x and j. Unknown letters pass through unchanged.
//
// Two transcriptions are compared with a weighted edit distance: deleting or
// inserting a segment costs 1, substituting within the same broad class
// (vowel for vowel, consonant for consonant) costs 0.5, across classes 1.
// Dividing by the longer transcription bounds the distance to [0, 1], and the
// similarity is 1 - distance.

use anyhow::Result;

use super::text::normalize;
use super::traits::{MetricFamily, SimilarityMetric};

/// Segment inserted between words.
pub const WORD_BOUNDARY: &str = "#";

/// Phonological similarity metric.
#[derive(Default)]
pub struct PhonologicalSimilarity;

impl PhonologicalSimilarity {
    /// Similarity of two sentences in [0, 1].
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        phonological_similarity(&transcribe(a), &transcribe(b))
    }
}

impl SimilarityMetric for PhonologicalSimilarity {
    fn family(&self) -> MetricFamily {
        MetricFamily::Phonological
    }

    fn score_aligned(&self, a: &[String], b: &[String]) -> Result<Vec<f64>> {
        Ok(a.iter()
            .zip(b.iter())
            .map(|(x, y)| self.similarity(x, y))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentClass {
    Vowel,
    Consonant,
    Boundary,
}

fn classify(segment: &str) -> SegmentClass {
    if segment == WORD_BOUNDARY {
        return SegmentClass::Boundary;
    }
    match segment.chars().next() {
        Some(c) if "aeiouɐɛɔẽĩõũ".contains(c) => SegmentClass::Vowel,
        _ => SegmentClass::Consonant,
    }
}

fn is_vowel_letter(c: char) -> bool {
    "aáàâãäeéêèëiíìîïoóòôõöuúùûüy".contains(c)
}

fn is_front_vowel_letter(c: char) -> bool {
    "eéêèëiíìîïy".contains(c)
}

/// Oral and nasal segments for a vowel letter.
fn vowel_segments(c: char) -> (&'static str, &'static str) {
    match c {
        'a' | 'á' | 'à' | 'â' | 'ä' => ("a", "ɐ̃"),
        'ã' => ("ɐ̃", "ɐ̃"),
        'é' | 'è' => ("ɛ", "ẽ"),
        'e' | 'ê' | 'ë' => ("e", "ẽ"),
        'i' | 'í' | 'ì' | 'î' | 'ï' | 'y' => ("i", "ĩ"),
        'ó' | 'ò' => ("ɔ", "õ"),
        'o' | 'ô' | 'ö' => ("o", "õ"),
        'õ' => ("õ", "õ"),
        _ => ("u", "ũ"),
    }
}

/// Transcribe text into phoneme segments, words separated by `#`.
pub fn transcribe(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    for (n, word) in normalize(text).split(' ').filter(|w| !w.is_empty()).enumerate() {
        if n > 0 {
            segments.push(WORD_BOUNDARY.to_string());
        }
        transcribe_word(word, &mut segments);
    }
    segments
}

fn transcribe_word(word: &str, out: &mut Vec<String>) {
    let chars: Vec<char> = word.chars().collect();
    let at = |i: usize| chars.get(i).copied();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = at(i + 1);

        if is_vowel_letter(c) {
            let (oral, nasal) = vowel_segments(c);
            // Vowel + m/n closing the syllable is a nasal vowel.
            let nasal_coda = matches!(next, Some('m') | Some('n'))
                && at(i + 2) != Some('h')
                && !at(i + 2).is_some_and(is_vowel_letter);
            if nasal_coda {
                out.push(nasal.to_string());
                i += 2;
            } else {
                out.push(oral.to_string());
                i += 1;
            }
            continue;
        }

        let (segment, width): (Option<&str>, usize) = match c {
            'c' if next == Some('h') => (Some("ʃ"), 2),
            'c' if next.is_some_and(is_front_vowel_letter) => (Some("s"), 1),
            'c' => (Some("k"), 1),
            'ç' => (Some("s"), 1),
            'g' if next == Some('u') && at(i + 2).is_some_and(is_front_vowel_letter) => {
                (Some("g"), 2)
            }
            'g' if next.is_some_and(is_front_vowel_letter) => (Some("ʒ"), 1),
            'q' if next == Some('u') => (Some("k"), 2),
            'q' => (Some("k"), 1),
            'l' if next == Some('h') => (Some("ʎ"), 2),
            'n' if next == Some('h') => (Some("ɲ"), 2),
            'r' if next == Some('r') => (Some("ʁ"), 2),
            'r' if i == 0 => (Some("ʁ"), 1),
            'r' => (Some("ɾ"), 1),
            's' if next == Some('s') => (Some("s"), 2),
            's' if i > 0
                && is_vowel_letter(chars[i - 1])
                && next.is_some_and(is_vowel_letter) =>
            {
                (Some("z"), 1)
            }
            'x' => (Some("ʃ"), 1),
            'j' => (Some("ʒ"), 1),
            'h' => (None, 1),
            'w' => (Some("u"), 1),
            _ => (None, 0),
        };

        match (segment, width) {
            (Some(s), w) => {
                out.push(s.to_string());
                i += w;
            }
            (None, 0) => {
                out.push(c.to_string());
                i += 1;
            }
            (None, w) => i += w,
        }
    }
}

/// Weighted edit distance between two segment sequences.
pub fn weighted_edit_distance(a: &[String], b: &[String]) -> f64 {
    let mut prev: Vec<f64> = (0..=b.len()).map(|j| j as f64).collect();
    let mut curr = vec![0.0; b.len() + 1];

    for (i, sa) in a.iter().enumerate() {
        curr[0] = (i + 1) as f64;
        for (j, sb) in b.iter().enumerate() {
            let sub = if sa == sb {
                0.0
            } else if classify(sa) == classify(sb) {
                0.5
            } else {
                1.0
            };
            curr[j + 1] = (prev[j] + sub).min(prev[j + 1] + 1.0).min(curr[j] + 1.0);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// 1 - weighted edit distance / longer length, in [0, 1].
pub fn phonological_similarity(a: &[String], b: &[String]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    (1.0 - weighted_edit_distance(a, b) / longest as f64).clamp(0.0, 1.0)
}
