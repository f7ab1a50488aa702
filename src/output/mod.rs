// Output formatting: terminal display and report files.

pub mod markdown;
pub mod terminal;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Column names carry accented letters, so this counts characters rather than
/// slicing bytes.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// Fixed-precision number, with "n/a" for NaN and signed "inf".
pub fn format_num(value: f64, precision: usize) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{value:.precision$}")
    }
}

/// p-values below 0.001 are shown as "<0.001".
pub fn format_p(p: f64) -> String {
    if p.is_finite() && p < 0.001 {
        "<0.001".to_string()
    } else {
        format_num(p, 3)
    }
}

/// Write any serializable value as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON report")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
