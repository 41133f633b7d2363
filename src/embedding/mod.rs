//! Text-to-vector embedding pipeline.
//!
//! Provides the [`TextEmbedder`] trait and an ONNX Runtime implementation of
//! the frozen AudioCLIP text head (1024 dimensions). The embedder is created
//! via [`create_embedder`] from configuration.

pub mod device;
pub mod local;

use anyhow::Result;

/// Number of dimensions in AudioCLIP text embeddings.
pub const EMBEDDING_DIM: usize = 1024;

/// Trait for embedding text into vectors.
///
/// Implementations produce vectors of exactly [`EMBEDDING_DIM`] dimensions,
/// one per input, in input order. All methods are synchronous; callers in
/// async contexts should use `tokio::task::spawn_blocking`.
pub trait TextEmbedder: Send + Sync {
    /// Embed a batch of texts in a single inference call.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for one input"))
    }

    /// Return the number of dimensions this embedder produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create the ONNX embedder from config. Model and tokenizer files must
/// already exist; see [`crate::model::download_missing`].
pub fn create_embedder(
    config: &crate::config::EncoderConfig,
) -> Result<Box<dyn TextEmbedder>> {
    let embedder = local::OnnxTextEmbedder::new(config)?;
    Ok(Box::new(embedder))
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let v = vec![3.0, 4.0];
        let normalized = l2_normalize(&v);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let v = vec![0.0, 0.0, 0.0];
        assert_eq!(l2_normalize(&v), vec![0.0, 0.0, 0.0]);
    }

    struct Echo;

    impl TextEmbedder for Echo {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32; EMBEDDING_DIM]).collect())
        }
    }

    #[test]
    fn default_embed_delegates_to_batch() {
        let v = Echo.embed("abc").unwrap();
        assert_eq!(v.len(), EMBEDDING_DIM);
        assert_eq!(v[0], 3.0);
        assert_eq!(Echo.dimensions(), EMBEDDING_DIM);
    }
}
