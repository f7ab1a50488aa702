// CSV dataset loader.
//
// The dataset is one row per source sentence:
//
//   Idioma, Texto Original, Tradução para o Português Moderno
//
// Rows are split by `Idioma` into the base-language and archaic sequences.
// The modern sequence is the modern translation carried on each base-language
// row, so it stays aligned with the base sentences by construction.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::triples::SentenceTriples;

/// Column holding the language label of each row.
pub const LANGUAGE_COLUMN: &str = "Idioma";
/// Column holding the sentence in its original variety.
pub const TEXT_COLUMN: &str = "Texto Original";
/// Column holding the modern-register translation.
pub const MODERN_COLUMN: &str = "Tradução para o Português Moderno";

/// Which `Idioma` values select the base and archaic rows.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub base_value: String,
    pub archaic_value: String,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            base_value: "Dzubukuá".to_string(),
            archaic_value: "Português Arcaico".to_string(),
        }
    }
}

/// Load sentence triples from a CSV file on disk.
pub fn load_triples(path: &Path, options: &LoaderOptions) -> Result<SentenceTriples> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open dataset {}", path.display()))?;
    read_triples(file, options).with_context(|| format!("Invalid dataset {}", path.display()))
}

/// Parse sentence triples from any CSV reader.
///
/// Fails before reading any rows if a required column is missing.
pub fn read_triples<R: Read>(reader: R, options: &LoaderOptions) -> Result<SentenceTriples> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let language_idx = find_column(&headers, LANGUAGE_COLUMN)?;
    let text_idx = find_column(&headers, TEXT_COLUMN)?;
    let modern_idx = find_column(&headers, MODERN_COLUMN)?;

    let mut triples = SentenceTriples::default();
    let mut other_rows = 0usize;

    for (line, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record {}", line + 2))?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();

        let language = field(language_idx);
        if language == options.base_value {
            triples.base.push(field(text_idx));
            triples.modern.push(field(modern_idx));
        } else if language == options.archaic_value {
            triples.archaic.push(field(text_idx));
        } else {
            other_rows += 1;
            debug!(line = line + 2, language = %language, "Skipping row with unknown language");
        }
    }

    let (base, archaic, modern) = triples.lengths();
    info!(base, archaic, modern, skipped = other_rows, "Loaded sentence triples");

    Ok(triples)
}

fn find_column(headers: &[String], name: &str) -> Result<usize> {
    headers.iter().position(|h| h == name).ok_or_else(|| {
        anyhow::anyhow!(
            "Missing required column '{}'. Found columns: {}",
            name,
            headers.join(", ")
        )
    })
}
