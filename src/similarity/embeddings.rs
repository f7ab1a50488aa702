// Sentence embeddings from a local ONNX sentence-transformer.
//
// Text is tokenized, run through the transformer, mean-pooled over real
// tokens (attention mask) and L2-normalized, so the cosine of two embeddings
// is just their dot product. The model runs locally; no API calls.
//
// The encoder is loaded once per run and shared by reference with every
// metric that needs it.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::debug;

/// Sentences per inference call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Anything that turns sentences into fixed-length vectors.
///
/// The ONNX encoder is the production implementation; tests supply their own.
pub trait SentenceEncoder {
    /// Encode texts into one vector each, in input order.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;
}

/// Sentence encoder backed by an ONNX transformer model.
pub struct OnnxSentenceEncoder {
    // Session::run takes &mut self; the Mutex lets a shared &self encode.
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    /// BERT-style exports take token_type_ids; RoBERTa-style ones do not.
    use_token_type_ids: bool,
    batch_size: usize,
}

impl OnnxSentenceEncoder {
    /// Load the model and tokenizer from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in the directory.
    /// Run `cognata download-model` first if they don't exist.
    pub fn load(model_dir: &Path, use_token_type_ids: bool) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            anyhow::bail!(
                "Embedding model not found: {}\nRun `cognata download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Embedding tokenizer not found: {}\nRun `cognata download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "Failed to load embedding model from {}",
                    model_path.display()
                )
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;

        debug!("Loaded sentence embedding model from {}", model_dir.display());

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            use_token_type_ids,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Override the number of sentences per inference call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run one padded batch through the model and mean-pool it.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let encodings: Vec<_> = texts
            .iter()
            .map(|t| {
                self.tokenizer
                    .encode(t.as_str(), true)
                    .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        if max_len == 0 {
            anyhow::bail!("Tokenizer produced no tokens for a batch of {batch_size} texts");
        }

        // Pad every sequence to max_len (pad id 0, mask 0).
        let mut input_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask: Vec<i64> = Vec::with_capacity(batch_size * max_len);

        for enc in &encodings {
            let ids = enc.get_ids();
            let pad_len = max_len - ids.len();
            input_ids.extend(ids.iter().map(|&id| id as i64));
            input_ids.extend(std::iter::repeat_n(0i64, pad_len));
            attention_mask.extend(enc.get_attention_mask().iter().map(|&m| m as i64));
            attention_mask.extend(std::iter::repeat_n(0i64, pad_len));
        }

        let shape = [batch_size as i64, max_len as i64];
        let ids_tensor =
            Tensor::from_array((shape, input_ids)).context("Failed to create input_ids tensor")?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
            .context("Failed to create attention_mask tensor")?;

        // Output 0 is last_hidden_state: [batch, seq_len, dim]
        let hidden_states = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

            let outputs = if self.use_token_type_ids {
                let type_tensor =
                    Tensor::from_array((shape, vec![0i64; batch_size * max_len]))
                        .context("Failed to create token_type_ids tensor")?;
                session.run(ort::inputs! {
                    "input_ids" => ids_tensor,
                    "attention_mask" => mask_tensor,
                    "token_type_ids" => type_tensor
                })
            } else {
                session.run(ort::inputs! {
                    "input_ids" => ids_tensor,
                    "attention_mask" => mask_tensor
                })
            }
            .context("Embedding ONNX inference failed")?;

            let (_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .context("Failed to extract embedding output tensor")?;

            data.to_vec()
        };

        let dim = hidden_states.len() / (batch_size * max_len);
        if dim == 0 || dim * batch_size * max_len != hidden_states.len() {
            anyhow::bail!(
                "Unexpected embedding output size {} for batch {}x{}",
                hidden_states.len(),
                batch_size,
                max_len
            );
        }

        Ok(mean_pool(&hidden_states, &attention_mask, batch_size, max_len, dim))
    }
}

impl SentenceEncoder for OnnxSentenceEncoder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            embeddings.extend(self.encode_batch(chunk)?);
        }
        debug!(sentences = texts.len(), "Computed sentence embeddings");
        Ok(embeddings)
    }
}

/// Mean-pool token embeddings weighted by the attention mask, then
/// L2-normalize each sentence vector.
///
/// `hidden` is a flattened `[batch, seq_len, dim]` tensor and `mask` a
/// flattened `[batch, seq_len]` mask.
pub fn mean_pool(
    hidden: &[f32],
    mask: &[i64],
    batch_size: usize,
    seq_len: usize,
    dim: usize,
) -> Vec<Vec<f64>> {
    let mut embeddings = Vec::with_capacity(batch_size);

    for i in 0..batch_size {
        let mut sum = vec![0.0_f64; dim];
        let mut mask_sum = 0.0_f64;

        for j in 0..seq_len {
            let mask_val = mask[i * seq_len + j] as f64;
            if mask_val > 0.0 {
                mask_sum += mask_val;
                let offset = (i * seq_len + j) * dim;
                for (k, acc) in sum.iter_mut().enumerate() {
                    *acc += hidden[offset + k] as f64 * mask_val;
                }
            }
        }

        if mask_sum > 0.0 {
            for val in &mut sum {
                *val /= mask_sum;
            }
        }

        l2_normalize(&mut sum);
        embeddings.push(sum);
    }

    embeddings
}

/// Scale a vector to unit length in place. Zero vectors are left alone.
pub fn l2_normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_ignores_padding() {
        // batch 1, seq 2, dim 2: second token is padding
        let hidden = [3.0_f32, 4.0, 100.0, 100.0];
        let mask = [1_i64, 0];
        let pooled = mean_pool(&hidden, &mask, 1, 2, 2);
        assert!((pooled[0][0] - 0.6).abs() < 1e-9);
        assert!((pooled[0][1] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_mean_pool_output_is_unit_length() {
        let hidden = [1.0_f32, 2.0, 3.0, 5.0, 7.0, 11.0];
        let mask = [1_i64, 1];
        let pooled = mean_pool(&hidden, &mask, 1, 2, 3);
        let norm: f64 = pooled[0].iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_l2_normalize_zero_vector_is_unchanged() {
        let mut v = vec![0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_load_missing_model_fails() {
        let dir = std::env::temp_dir().join("cognata-test-no-model");
        let err = OnnxSentenceEncoder::load(&dir, true).err().unwrap().to_string();
        assert!(err.contains("model.onnx"), "got: {err}");
    }
}
