//! JinaBERT embedder using the Candle ML framework.
//!
//! Tokenizes with a HuggingFace tokenizer, runs the JinaBERT encoder,
//! mean-pools over tokens and L2-normalises. Model weights and tokenizer are
//! read from a directory containing `model.safetensors` and `tokenizer.json`.

use super::traits::Embedder;
use crate::error::EmbeddingError;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Activation, VarBuilder};
use candle_transformers::models::jina_bert::{BertModel, Config, PositionEmbeddingType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokenizers::tokenizer::{Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};
use tracing::info;

pub const MODEL_FILENAME: &str = "model.safetensors";
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// Architecture parameters for a JinaBERT checkpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JinaBertConfig {
    /// Model identifier, for logging
    pub model_id: String,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    /// Token limit; longer inputs are truncated
    pub max_position_embeddings: usize,
}

impl Default for JinaBertConfig {
    fn default() -> Self {
        // jinaai/jina-embeddings-v2-small-en
        Self {
            model_id: "jinaai/jina-embeddings-v2-small-en".to_string(),
            hidden_size: 512,
            num_hidden_layers: 4,
            num_attention_heads: 8,
            intermediate_size: 2048,
            max_position_embeddings: 512,
        }
    }
}

/// JinaBERT sentence embedder.
pub struct JinaBertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    config: JinaBertConfig,
    device: Device,
}

impl JinaBertEmbedder {
    /// Loads weights and tokenizer from a model directory.
    pub fn from_dir(dir: &Path, config: JinaBertConfig) -> Result<Self, EmbeddingError> {
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read(&path)
                .map_err(|e| EmbeddingError::ModelLoad(format!("{}: {}", path.display(), e)))
        };
        Self::from_bytes(read(MODEL_FILENAME)?, read(TOKENIZER_FILENAME)?, config)
    }

    /// Builds the embedder from safetensors weights and tokenizer JSON bytes.
    pub fn from_bytes(
        model_bytes: Vec<u8>,
        tokenizer_bytes: Vec<u8>,
        config: JinaBertConfig,
    ) -> Result<Self, EmbeddingError> {
        info!(
            "Loading embedding model '{}' ({:.2}MB)",
            config.model_id,
            model_bytes.len() as f64 / 1_000_000.0
        );

        let mut tokenizer = Tokenizer::from_bytes(tokenizer_bytes)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_position_embeddings,
                stride: 0,
                strategy: TruncationStrategy::OnlyFirst,
                direction: TruncationDirection::Right,
            }))
            .map_err(|e| EmbeddingError::InvalidConfig(format!("Truncation: {}", e)))?;

        let model_config = Config::new(
            tokenizer.get_vocab_size(true),
            config.hidden_size,
            config.num_hidden_layers,
            config.num_attention_heads,
            config.intermediate_size,
            Activation::Gelu,
            config.max_position_embeddings,
            2,     // type_vocab_size
            0.02,  // initializer_range
            1e-12, // layer_norm_eps
            0,     // pad_token_id
            PositionEmbeddingType::Alibi,
        );

        let device = select_device();
        // jina_bert computes its ALiBi bias in F32, so weights must match
        let vb = VarBuilder::from_buffered_safetensors(model_bytes, DType::F32, &device)
            .map_err(|e| EmbeddingError::ModelLoad(format!("VarBuilder: {}", e)))?;
        let model = BertModel::new(vb, &model_config)
            .map_err(|e| EmbeddingError::ModelLoad(format!("BertModel: {}", e)))?;

        Ok(Self {
            model,
            tokenizer,
            config,
            device,
        })
    }

    pub fn config(&self) -> &JinaBertConfig {
        &self.config
    }

    fn infer(&self, token_ids: Vec<u32>) -> Result<Vec<f32>, EmbeddingError> {
        let inference = |e: candle_core::Error| EmbeddingError::InferenceFailed(e.to_string());

        let n_tokens = token_ids.len();
        let input = Tensor::from_vec(token_ids, n_tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(inference)?;

        // [1, seq_len, hidden] -> mean over tokens -> [1, hidden]
        let hidden = self.model.forward(&input).map_err(inference)?;
        let pooled = hidden
            .sum(1)
            .and_then(|t| t.affine(1.0 / n_tokens as f64, 0.0))
            .map_err(inference)?;
        let norm = pooled
            .sqr()
            .and_then(|t| t.sum_keepdim(1))
            .and_then(|t| t.sqrt())
            .map_err(inference)?;

        pooled
            .broadcast_div(&norm)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(inference)
    }
}

impl Embedder for JinaBertEmbedder {
    fn embedding_dim(&self) -> usize {
        self.config.hidden_size
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.config.hidden_size]);
        }
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::TokenizationFailed(e.to_string()))?;
        self.infer(encoding.get_ids().to_vec())
    }
}

/// CUDA, then Metal, then CPU.
fn select_device() -> Device {
    if let Ok(device) = Device::new_cuda(0) {
        info!("Using CUDA GPU");
        return device;
    }
    if let Ok(device) = Device::new_metal(0) {
        info!("Using Metal GPU");
        return device;
    }
    info!("Using CPU");
    Device::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_tokenizer_bytes() {
        let result = JinaBertEmbedder::from_bytes(vec![1, 2, 3], vec![4, 5, 6], Default::default());
        assert!(matches!(result, Err(EmbeddingError::ModelLoad(_))));
    }

    #[test]
    fn test_missing_model_dir() {
        let result = JinaBertEmbedder::from_dir(Path::new("/nonexistent"), Default::default());
        assert!(matches!(result, Err(EmbeddingError::ModelLoad(_))));
    }
}
