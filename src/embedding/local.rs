//! Local ONNX Runtime text embedder.
//!
//! Implements [`TextEmbedder`] for an ONNX export of the AudioCLIP text head
//! via `ort`. Handles CLIP tokenization, inference and end-of-text pooling.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ndarray::{s, ArrayView1, ArrayView2, ArrayView3};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::device::Device;
use super::{l2_normalize, TextEmbedder, EMBEDDING_DIM};
use crate::config::EncoderConfig;

/// CLIP's pad token. The original BPE pads with id 0, which keeps the
/// end-of-text token the largest id in every row.
const PAD_ID: u32 = 0;
const PAD_TOKEN: &str = "!";

/// Output names tried before falling back to the first output.
const OUTPUT_NAMES: [&str; 3] = ["text_embeds", "text_features", "last_hidden_state"];

/// ONNX-based AudioCLIP text embedder.
pub struct OnnxTextEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    input_name: String,
    normalize: bool,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
// The Mutex guarantees exclusive access during run().
unsafe impl Send for OnnxTextEmbedder {}
unsafe impl Sync for OnnxTextEmbedder {}

impl OnnxTextEmbedder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        config.validate()?;
        let model_path = config.resolved_model_path();
        let tokenizer_path = config.resolved_tokenizer_path();
        let device = config.parsed_device()?;

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `audioclip-text model download` or set download_model = true.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `audioclip-text model download` or set download_model = true.",
            tokenizer_path.display()
        );

        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?;
        let session = on_device(builder, device)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model_path.display(), %device, "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        // The text head was traced with a fixed context length.
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::Fixed(config.max_length),
            pad_id: PAD_ID,
            pad_token: PAD_TOKEN.into(),
            ..Default::default()
        }));

        tracing::info!(tokenizer = %tokenizer_path.display(), "tokenizer loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            input_name: config.input_name.clone(),
            normalize: config.normalize,
        })
    }
}

#[cfg(feature = "cuda")]
fn on_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder> {
    use ort::execution_providers::CUDAExecutionProvider;

    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda(id) => Ok(builder.with_execution_providers([CUDAExecutionProvider::default()
            .with_device_id(id)
            .build()
            .error_on_failure()])?),
    }
}

#[cfg(not(feature = "cuda"))]
fn on_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder> {
    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda(_) => anyhow::bail!(
            "device {device} requested but this build has no CUDA support (enable the `cuda` feature)"
        ),
    }
}

impl TextEmbedder for OnnxTextEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        let mut input_ids = Vec::with_capacity(batch_size * seq_len);
        for encoding in &encodings {
            anyhow::ensure!(
                encoding.get_ids().len() == seq_len,
                "tokenizer produced ragged batch ({} vs {seq_len} tokens)",
                encoding.get_ids().len()
            );
            input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_tensor = Tensor::from_array((shape, input_ids.clone().into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            self.input_name.as_str() => input_tensor,
        })?;

        let value = OUTPUT_NAMES
            .iter()
            .find_map(|name| outputs.get(*name))
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .context("failed to extract text embedding tensor")?;
        let dims: &[i64] = &shape;

        let vectors = pool_output(dims, data, &input_ids, batch_size, seq_len)?;
        tracing::debug!(batch_size, seq_len, ?dims, "text batch encoded");

        if self.normalize {
            Ok(vectors.iter().map(|v| l2_normalize(v)).collect())
        } else {
            Ok(vectors)
        }
    }
}

/// Turn the raw model output into one vector per input.
///
/// A `[batch, dim]` output is already pooled. A `[batch, seq, dim]` output is
/// reduced the way CLIP does it: take the hidden state at the end-of-text
/// token, i.e. the position of the largest token id in each row.
fn pool_output(
    dims: &[i64],
    data: &[f32],
    input_ids: &[i64],
    batch_size: usize,
    seq_len: usize,
) -> Result<Vec<Vec<f32>>> {
    match *dims {
        [b, d] if b as usize == batch_size && d as usize == EMBEDDING_DIM => {
            let view = ArrayView2::from_shape((batch_size, EMBEDDING_DIM), data)?;
            Ok(view.rows().into_iter().map(|row| row.to_vec()).collect())
        }
        [b, seq, d] if b as usize == batch_size && seq > 0 && d as usize == EMBEDDING_DIM => {
            let out_seq = seq as usize;
            let hidden = ArrayView3::from_shape((batch_size, out_seq, EMBEDDING_DIM), data)?;
            let ids = ArrayView2::from_shape((batch_size, seq_len), input_ids)?;
            Ok((0..batch_size)
                .map(|row| {
                    let pos = eot_position(ids.row(row)).min(out_seq - 1);
                    hidden.slice(s![row, pos, ..]).to_vec()
                })
                .collect())
        }
        _ => anyhow::bail!(
            "unexpected text embedding shape: {dims:?}, expected [{batch_size}, {EMBEDDING_DIM}] \
             or [{batch_size}, seq, {EMBEDDING_DIM}]"
        ),
    }
}

/// First position of the largest token id.
fn eot_position(ids: ArrayView1<'_, i64>) -> usize {
    let mut best = 0;
    for (i, &id) in ids.iter().enumerate() {
        if id > ids[best] {
            best = i;
        }
    }
    best
}
