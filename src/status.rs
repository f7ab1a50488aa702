// Status display: model availability and the active configuration.

use colored::Colorize;

use crate::config::Config;
use crate::download;

/// Display configuration and model status to the terminal.
pub fn show(config: &Config) {
    let model_dir = download::embedding_model_dir(&config.model_dir);
    if download::embedding_files_present(&config.model_dir) {
        let size = std::fs::metadata(model_dir.join("model.onnx"))
            .map(|m| format_bytes(m.len()))
            .unwrap_or_else(|_| "unknown".to_string());
        println!(
            "Embedding model: {} ({}, {})",
            "present".green(),
            model_dir.display(),
            size
        );
    } else {
        println!("Embedding model: {}", "not downloaded".yellow());
        println!("  Run `cognata download-model` to enable semantic similarity");
    }

    println!(
        "Languages: base = '{}', archaic = '{}'",
        config.base_language, config.archaic_language
    );
    println!(
        "Metrics: n-gram size {}, word-vector dimension {}",
        config.ngram_size, config.word_dim
    );
    println!(
        "Analyses: alpha {}, fit cap {} iterations, k-means cap {} iterations, seed {}",
        config.alpha, config.fit_max_iter, config.kmeans_max_iter, config.seed
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(90 * 1024 * 1024), "90.0 MB");
    }
}
