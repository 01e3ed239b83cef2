//! ONNX Runtime sentence embedder.
//!
//! Mean-pooled, L2-normalised embeddings from a sentence-transformers model
//! exported to ONNX (all-MiniLM-L6-v2 by default, 384 dimensions). The model
//! directory must contain `model.onnx` and `tokenizer.json`.

use std::path::Path;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::provider::{EmbedError, EmbeddingProvider};
use crate::similarity::normalize;

/// Texts per inference call. Bounds padded tensor size for long contracts.
const BATCH_SIZE: usize = 32;
const MAX_TOKENS: usize = 256;

pub struct OnnxEmbedder {
    name: String,
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
}

impl OnnxEmbedder {
    /// Load a model from a directory containing `model.onnx` and `tokenizer.json`.
    ///
    /// The directory name is used as the model name in review metadata.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let session = Session::builder()?.commit_from_file(&model_path)?;
        let dim = infer_dim(session.outputs()[0].dtype()).unwrap_or(384);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams::default()));

        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        info!(dim, model = %name, "loaded embedding model");
        Ok(Self {
            name,
            session,
            tokenizer,
            dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn run_batch(&mut self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let batch = texts.len();
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = vec![0i64; batch * seq_len];
        let mut attention_mask = vec![0i64; batch * seq_len];
        let mut token_type_ids = vec![0i64; batch * seq_len];
        for (i, enc) in encodings.iter().enumerate() {
            let row = i * seq_len;
            let cells = enc
                .get_ids()
                .iter()
                .zip(enc.get_attention_mask())
                .zip(enc.get_type_ids());
            for (j, ((&id, &mask), &tid)) in cells.enumerate() {
                input_ids[row + j] = i64::from(id);
                attention_mask[row + j] = i64::from(mask);
                token_type_ids[row + j] = i64::from(tid);
            }
        }

        let shape = [batch as i64, seq_len as i64];
        let outputs = self.session.run(ort::inputs![
            "input_ids" => Tensor::from_array((shape, input_ids.into_boxed_slice()))?,
            "attention_mask" => Tensor::from_array((shape, attention_mask.clone().into_boxed_slice()))?,
            "token_type_ids" => Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?,
        ])?;

        // Token embeddings: [batch, seq, dim].
        let (out_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = out_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch && dims[2] as usize == self.dim,
            "unexpected output shape {dims:?}, expected [{batch}, {seq_len}, {}]",
            self.dim
        );
        let out_seq = dims[1] as usize;

        Ok((0..batch)
            .map(|i| {
                let mask = &attention_mask[i * seq_len..(i + 1) * seq_len];
                let tokens = &data[i * out_seq * self.dim..(i + 1) * out_seq * self.dim];
                mean_pool(tokens, mask, self.dim)
            })
            .collect())
    }
}

/// Attention-masked mean over token embeddings, normalised to unit length.
fn mean_pool(tokens: &[f32], mask: &[i64], dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let mut count = 0.0f32;
    for (token, &m) in tokens.chunks_exact(dim).zip(mask) {
        if m == 0 {
            continue;
        }
        for (p, x) in pooled.iter_mut().zip(token) {
            *p += x;
        }
        count += 1.0;
    }
    if count > 0.0 {
        pooled.iter_mut().for_each(|p| *p /= count);
    }
    normalize(&mut pooled);
    pooled
}

fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

impl EmbeddingProvider for OnnxEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            debug!(batch = chunk.len(), "embedding batch");
            let vecs = self
                .run_batch(chunk)
                .map_err(|e| EmbedError::Backend(format!("{e:#}")))?;
            out.extend(vecs);
        }
        Ok(out)
    }
}
