// Sentence-embedding model download.
//
// Fetches the ONNX export and tokenizer of all-MiniLM-L6-v2 from HuggingFace
// into a platform data directory (~/.local/share/cognata/models/ on Linux)
// so semantic similarity can run offline afterwards.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// HuggingFace repo of the default embedding model.
pub const EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

const EMBEDDING_SUBDIR: &str = "all-MiniLM-L6-v2";

/// (path in the repo, local file name, size hint for the progress line)
const EMBEDDING_FILES: [(&str, &str, Option<&str>); 2] = [
    ("tokenizer.json", "tokenizer.json", None),
    ("onnx/model.onnx", "model.onnx", Some("~90 MB")),
];

/// Default directory for model files: the platform data dir + cognata/models.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cognata")
        .join("models")
}

/// Subdirectory of `base` holding the embedding model.
pub fn embedding_model_dir(base: &Path) -> PathBuf {
    base.join(EMBEDDING_SUBDIR)
}

/// Whether every embedding model file exists under `base`.
pub fn embedding_files_present(base: &Path) -> bool {
    let dir = embedding_model_dir(base);
    EMBEDDING_FILES.iter().all(|(_, local, _)| dir.join(local).exists())
}

fn file_url(remote: &str) -> String {
    format!("https://huggingface.co/{EMBEDDING_MODEL}/resolve/main/{remote}")
}

/// Download the embedding model into `base`, skipping files already present.
pub async fn download_model(base: &Path) -> Result<()> {
    let dir = embedding_model_dir(base);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    println!("\nSentence embedding model ({EMBEDDING_MODEL}):");
    let client = reqwest::Client::new();

    for (remote, local, size_hint) in EMBEDDING_FILES {
        let dest = dir.join(local);
        if dest.exists() {
            info!(file = local, "Model file already exists, skipping");
            println!("  {local} (already exists)");
            continue;
        }
        match size_hint {
            Some(hint) => println!("  Downloading {local} ({hint})..."),
            None => println!("  Downloading {local}..."),
        }
        download_file(&client, &file_url(remote), &dest).await?;
    }

    Ok(())
}

/// Stream one file to disk through a `.part` file, renamed on success so an
/// interrupted download is never mistaken for a complete one.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .context("Invalid progress bar template")?
                    .progress_chars("=> "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("    {spinner} {bytes}")
                    .context("Invalid progress bar template")?,
            );
            pb
        }
    };

    let partial = dest.with_extension("part");
    let mut file = std::fs::File::create(&partial)
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read response body")?
    {
        file.write_all(&chunk)
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        pb.inc(chunk.len() as u64);
    }
    file.flush()
        .with_context(|| format!("Failed to flush {}", partial.display()))?;
    drop(file);

    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;
    pb.finish_and_clear();

    info!(url, dest = %dest.display(), "Downloaded model file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir_is_under_cognata() {
        let path = default_model_dir();
        let path_str = path.to_string_lossy();
        assert!(
            path_str.contains("cognata") && path_str.contains("models"),
            "Expected path containing cognata/models, got: {path_str}"
        );
    }

    #[test]
    fn test_file_urls_point_at_the_model_repo() {
        assert_eq!(
            file_url("onnx/model.onnx"),
            "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx"
        );
    }

    #[test]
    fn test_embedding_files_present() {
        let base = std::env::temp_dir().join("cognata-download-test");
        let _ = std::fs::remove_dir_all(&base);
        assert!(!embedding_files_present(&base));

        let dir = embedding_model_dir(&base);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tokenizer.json"), b"{}").unwrap();
        assert!(!embedding_files_present(&base), "model.onnx still missing");

        std::fs::write(dir.join("model.onnx"), b"fake").unwrap();
        assert!(embedding_files_present(&base));

        std::fs::remove_dir_all(&base).unwrap();
    }
}
