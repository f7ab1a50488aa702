use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::corpus::loader::LoaderOptions;
use crate::corpus::triples::VarietyLabels;

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. CLI flags
/// override individual values after loading.
pub struct Config {
    /// Directory holding the sentence-embedding model (COGNATA_MODEL_DIR)
    pub model_dir: PathBuf,
    /// `Idioma` value of base-language rows (COGNATA_BASE_LABEL)
    pub base_language: String,
    /// `Idioma` value of archaic rows (COGNATA_ARCHAIC_LABEL)
    pub archaic_language: String,
    pub ngram_size: usize,
    /// Dimension of the corpus-trained word vectors
    pub word_dim: usize,
    /// Significance level for hypothesis tests
    pub alpha: f64,
    pub fit_max_iter: usize,
    pub kmeans_max_iter: usize,
    pub seed: u64,
    /// Whether the ONNX model takes a token_type_ids input
    pub token_type_ids: bool,
    /// Sentences per ONNX inference call (COGNATA_BATCH_SIZE)
    pub batch_size: usize,
}

/// Parse an optional env var, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {name}: '{raw}'")),
        _ => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default; only malformed numbers are errors.
    pub fn load() -> Result<Self> {
        let model_dir = env::var("COGNATA_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::download::default_model_dir());

        let config = Self {
            model_dir,
            base_language: env::var("COGNATA_BASE_LABEL")
                .unwrap_or_else(|_| "Dzubukuá".to_string()),
            archaic_language: env::var("COGNATA_ARCHAIC_LABEL")
                .unwrap_or_else(|_| "Português Arcaico".to_string()),
            ngram_size: parse_var("COGNATA_NGRAM_SIZE", 3)?,
            word_dim: parse_var("COGNATA_WORD_DIM", 50)?,
            alpha: parse_var("COGNATA_ALPHA", 0.05)?,
            fit_max_iter: parse_var("COGNATA_FIT_MAX_ITER", 500)?,
            kmeans_max_iter: parse_var("COGNATA_KMEANS_MAX_ITER", 300)?,
            seed: parse_var("COGNATA_SEED", 42)?,
            token_type_ids: parse_var("COGNATA_TOKEN_TYPE_IDS", true)?,
            batch_size: parse_var(
                "COGNATA_BATCH_SIZE",
                crate::similarity::embeddings::DEFAULT_BATCH_SIZE,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values no analysis can run with.
    pub fn validate(&self) -> Result<()> {
        if self.ngram_size == 0 {
            anyhow::bail!("COGNATA_NGRAM_SIZE must be at least 1");
        }
        if self.word_dim == 0 {
            anyhow::bail!("COGNATA_WORD_DIM must be at least 1");
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            anyhow::bail!("COGNATA_ALPHA must be in (0, 1), got {}", self.alpha);
        }
        if self.fit_max_iter == 0 || self.kmeans_max_iter == 0 {
            anyhow::bail!("Iteration caps must be at least 1");
        }
        if self.batch_size == 0 {
            anyhow::bail!("COGNATA_BATCH_SIZE must be at least 1");
        }
        Ok(())
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            base_value: self.base_language.clone(),
            archaic_value: self.archaic_language.clone(),
        }
    }

    /// Labels used in result column names. The base label follows the
    /// configured base language; the other two stay short.
    pub fn variety_labels(&self) -> VarietyLabels {
        VarietyLabels {
            base: self.base_language.clone(),
            ..VarietyLabels::default()
        }
    }

    /// Check that the embedding model is on disk.
    /// Call this before any operation that needs semantic similarity.
    pub fn require_model(&self) -> Result<()> {
        if !crate::download::embedding_files_present(&self.model_dir) {
            anyhow::bail!(
                "Sentence-embedding model not found in {}\n\
                 Run `cognata download-model` to download it,\n\
                 or pass --metrics without `semantic` to skip semantic similarity.",
                crate::download::embedding_model_dir(&self.model_dir).display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            model_dir: PathBuf::from("/nonexistent"),
            base_language: "Dzubukuá".to_string(),
            archaic_language: "Português Arcaico".to_string(),
            ngram_size: 3,
            word_dim: 50,
            alpha: 0.05,
            fit_max_iter: 500,
            kmeans_max_iter: 300,
            seed: 42,
            token_type_ids: true,
            batch_size: 32,
        }
    }

    #[test]
    fn test_validate_rejects_bad_alpha() {
        let mut c = config();
        assert!(c.validate().is_ok());
        c.alpha = 1.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut c = config();
        c.batch_size = 0;
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("COGNATA_BATCH_SIZE"), "got: {err}");
    }

    #[test]
    fn test_require_model_names_download_command() {
        let err = config().require_model().unwrap_err().to_string();
        assert!(err.contains("download-model"), "got: {err}");
    }

    #[test]
    fn test_labels_follow_base_language() {
        let mut c = config();
        c.base_language = "Kipeá".to_string();
        let labels = c.variety_labels();
        assert_eq!(labels.base, "Kipeá");
        assert_eq!(labels.archaic, "Arcaico");
        assert_eq!(c.loader_options().archaic_value, "Português Arcaico");
    }
}
