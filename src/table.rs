// Results table: the aggregated similarity scores of one run.
//
// Columns are named "<language pair> (<metric family>)" and rows are aligned
// sentence indices. The table is built once, validated, and only read after
// that: every analyzer borrows it, and derived tables (column selections,
// NaN-free copies) are new values.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::corpus::triples::{LanguagePair, VarietyLabels};
use crate::similarity::traits::{MetricFamily, PairScores};

/// One named column of scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Immutable table of similarity scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    columns: Vec<Column>,
    rows: usize,
}

/// Column name for a language pair and metric family,
/// e.g. "Dzubukuá - Arcaico (Semântica)".
pub fn column_name(pair: LanguagePair, family: MetricFamily, labels: &VarietyLabels) -> String {
    format!("{} ({})", pair.label(labels), family.label())
}

impl ResultsTable {
    /// Build a table from named columns.
    ///
    /// Every column must have the same length; a mismatch is rejected rather
    /// than padded or truncated so no score lands on the wrong sentence pair.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map(|c| c.values.len()).unwrap_or(0);

        for (i, col) in columns.iter().enumerate() {
            if col.values.len() != rows {
                anyhow::bail!(
                    "Column length mismatch: '{}' has {} rows but '{}' has {}",
                    col.name,
                    col.values.len(),
                    columns[0].name,
                    rows
                );
            }
            if columns[..i].iter().any(|c| c.name == col.name) {
                anyhow::bail!("Duplicate column name '{}'", col.name);
            }
        }

        Ok(Self { columns, rows })
    }

    /// Aggregate metric outputs into one table: families in the given order,
    /// each contributing its three language-pair columns.
    pub fn from_pair_scores(scores: &[PairScores], labels: &VarietyLabels) -> Result<Self> {
        let columns: Vec<Column> = scores
            .iter()
            .flat_map(|s| {
                LanguagePair::ALL.into_iter().map(move |pair| Column {
                    name: column_name(pair, s.family, labels),
                    values: s.get(pair).to_vec(),
                })
            })
            .collect();

        let table = Self::new(columns)?;
        info!(
            rows = table.row_count(),
            columns = table.column_count(),
            "Aggregated similarity table"
        );
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Like `column`, but a missing name is an error listing what exists.
    pub fn require_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name).ok_or_else(|| {
            anyhow::anyhow!(
                "No column named '{}'. Available: {}",
                name,
                self.column_names().join(", ")
            )
        })
    }

    /// Values of row `i` in column order.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c.values[i]).collect()
    }

    /// A new table holding only the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|&n| {
                self.require_column(n).map(|v| Column {
                    name: n.to_string(),
                    values: v.to_vec(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(columns)
    }

    pub fn has_missing(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.values.iter().any(|v| !v.is_finite()))
    }

    /// Copy of the table without any row holding a NaN or infinite value.
    ///
    /// Returns the new table and the number of rows dropped.
    pub fn drop_incomplete_rows(&self) -> (Self, usize) {
        let keep: Vec<usize> = (0..self.rows)
            .filter(|&i| self.columns.iter().all(|c| c.values[i].is_finite()))
            .collect();
        let dropped = self.rows - keep.len();

        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: keep.iter().map(|&i| c.values[i]).collect(),
            })
            .collect();

        if dropped > 0 {
            debug!(dropped, kept = keep.len(), "Dropped incomplete rows");
        }
        (
            Self {
                columns,
                rows: keep.len(),
            },
            dropped,
        )
    }

    /// Row-major matrix (rows x columns) of all values.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.rows, self.columns.len(), |i, j| self.columns[j].values[i])
    }

    /// Write the table as CSV: a header of column names, one line per row.
    ///
    /// Floats use Rust's shortest round-trip formatting, so reading the file
    /// back yields the same values.
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut w = csv::Writer::from_writer(writer);
        w.write_record(self.columns.iter().map(|c| c.name.as_str()))
            .context("Failed to write CSV header")?;
        for i in 0..self.rows {
            w.write_record(self.columns.iter().map(|c| c.values[i].to_string()))
                .with_context(|| format!("Failed to write CSV row {i}"))?;
        }
        w.flush().context("Failed to flush CSV output")?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv_to(&mut buf)?;
        String::from_utf8(buf).context("CSV output was not valid UTF-8")
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_csv_to(file)
    }

    /// Read a table previously written with `write_csv`.
    ///
    /// Empty cells become NaN.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut r = csv::Reader::from_reader(reader);
        let names: Vec<String> = r
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for (line, record) in r.records().enumerate() {
            let record = record.with_context(|| format!("Malformed CSV record {}", line + 2))?;
            for (j, col) in values.iter_mut().enumerate() {
                let cell = record.get(j).unwrap_or("").trim();
                let value = if cell.is_empty() {
                    f64::NAN
                } else {
                    cell.parse::<f64>().with_context(|| {
                        format!("Non-numeric value '{}' in column '{}'", cell, names[j])
                    })?
                };
                col.push(value);
            }
        }

        Self::new(
            names
                .into_iter()
                .zip(values)
                .map(|(name, values)| Column { name, values })
                .collect(),
        )
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_csv_reader(file)
            .with_context(|| format!("Invalid results table {}", path.display()))
    }
}
