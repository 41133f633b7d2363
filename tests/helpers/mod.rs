#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use audioclip_text::config::EncoderConfig;
use audioclip_text::document::traversal::{PathSelector, TraversalPaths};
use audioclip_text::document::{Document, DocumentArray};
use audioclip_text::embedding::{l2_normalize, TextEmbedder, EMBEDDING_DIM};
use audioclip_text::encoder::TextEmbeddingEncoder;

/// Deterministic bag-of-words embedder: every lowercase word bumps one of
/// the 1024 dimensions. Texts sharing words end up close in cosine space.
/// Records the size of every batch it is handed.
#[derive(Default)]
pub struct HashEmbedder {
    pub batches: Arc<Mutex<Vec<usize>>>,
}

pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    for word in text.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        v[(hasher.finish() % EMBEDDING_DIM as u64) as usize] += 1.0;
    }
    l2_normalize(&v)
}

impl TextEmbedder for HashEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batches.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|t| hash_embedding(t)).collect())
    }
}

/// Fails on the `fail_on`-th call (0-based), succeeds otherwise.
pub struct FailingEmbedder {
    pub fail_on: usize,
    pub calls: Mutex<usize>,
}

impl TextEmbedder for FailingEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut calls = self.calls.lock().unwrap();
        let call = *calls;
        *calls += 1;
        anyhow::ensure!(call != self.fail_on, "simulated device out of memory");
        Ok(texts.iter().map(|t| hash_embedding(t)).collect())
    }
}

/// Returns vectors of the wrong length.
pub struct ShortEmbedder;

impl TextEmbedder for ShortEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.5; 384]).collect())
    }
}

/// Encoder over a [`HashEmbedder`], plus a handle on its recorded batch sizes.
pub fn test_encoder(config: EncoderConfig) -> (TextEmbeddingEncoder, Arc<Mutex<Vec<usize>>>) {
    let embedder = HashEmbedder::default();
    let batches = Arc::clone(&embedder.batches);
    let encoder = TextEmbeddingEncoder::with_embedder(
        config,
        Box::new(embedder),
        Box::new(PathSelector),
    )
    .unwrap();
    (encoder, batches)
}

pub fn encoder_with(embedder: Box<dyn TextEmbedder>) -> TextEmbeddingEncoder {
    TextEmbeddingEncoder::with_embedder(
        EncoderConfig::default(),
        embedder,
        Box::new(PathSelector),
    )
    .unwrap()
}

/// One root with three chunks; the first chunk has two chunks of its own.
pub fn nested_docs(text: &str) -> DocumentArray {
    let mut docs = DocumentArray::new();
    let root = docs.push(Document::with_id("root1").text(text));
    let chunk11 = docs.add_chunk(root, Document::with_id("chunk11").text(text));
    docs.add_chunk(root, Document::with_id("chunk12").text(text));
    docs.add_chunk(root, Document::with_id("chunk13").text(text));
    docs.add_chunk(chunk11, Document::with_id("chunk111").text(text));
    docs.add_chunk(chunk11, Document::with_id("chunk112").text(text));
    docs
}

/// Number of documents selected by `path` that carry an embedding.
pub fn embedded_count(docs: &DocumentArray, path: &str) -> usize {
    let ids = TraversalPaths::parse(path).unwrap().apply(docs);
    docs.embeddings(&ids).iter().filter(|e| e.is_some()).count()
}
