//! The text embedding encoder: selects documents, batches their text through
//! a [`TextEmbedder`] and writes the vectors back in place.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::config::EncoderConfig;
use crate::document::traversal::{DocumentSelector, PathSelector};
use crate::document::{DocId, DocumentArray, DocumentTree};
use crate::embedding::{self, TextEmbedder};

/// Per-call overrides. Unset fields fall back to the encoder's config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EncodeParameters {
    pub traversal_paths: Option<String>,
    pub batch_size: Option<usize>,
}

impl EncodeParameters {
    /// Parse a host-style parameter map such as
    /// `{"traversal_paths": "@c", "batch_size": 8}`. Unknown keys are ignored;
    /// `null` is treated as an empty map.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).context("invalid encode parameters")
    }

    pub fn traversal_paths(mut self, paths: impl Into<String>) -> Self {
        self.traversal_paths = Some(paths.into());
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// What an `encode` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EncodeSummary {
    /// Documents matched by the traversal path.
    pub selected: usize,
    /// Documents that received an embedding.
    pub encoded: usize,
    /// Selected documents left alone because they had no text.
    pub skipped: usize,
    pub batches: usize,
}

pub struct TextEmbeddingEncoder {
    config: EncoderConfig,
    embedder: Box<dyn TextEmbedder>,
    selector: Box<dyn DocumentSelector>,
}

impl TextEmbeddingEncoder {
    /// Load the tokenizer and model from the configured local paths.
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        let embedder =
            embedding::create_embedder(&config).context("failed to create text embedder")?;
        Self::with_embedder(config, embedder, Box::new(PathSelector))
    }

    /// Like [`new`](Self::new), but first fetches missing artifacts when
    /// `download_model` is enabled.
    pub async fn load(config: EncoderConfig) -> Result<Self> {
        if config.download_model {
            crate::model::download_missing(&config, false)
                .await
                .context("failed to download model artifacts")?;
        }
        tokio::task::spawn_blocking(move || Self::new(config)).await?
    }

    /// Build an encoder around host-supplied capabilities.
    pub fn with_embedder(
        config: EncoderConfig,
        embedder: Box<dyn TextEmbedder>,
        selector: Box<dyn DocumentSelector>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            embedder,
            selector,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Attach an embedding to every selected document with non-empty text.
    ///
    /// `None` or an empty collection is a no-op. Documents without text keep
    /// whatever embedding they had. Every batch is computed before anything
    /// is written, so an error leaves `docs` untouched.
    pub fn encode(
        &self,
        docs: Option<&mut DocumentArray>,
        parameters: &EncodeParameters,
    ) -> Result<EncodeSummary> {
        let Some(docs) = docs else {
            return Ok(EncodeSummary::default());
        };
        if docs.is_empty() {
            return Ok(EncodeSummary::default());
        }

        let paths = parameters
            .traversal_paths
            .as_deref()
            .unwrap_or(&self.config.traversal_paths);
        let batch_size = parameters.batch_size.unwrap_or(self.config.batch_size);
        anyhow::ensure!(batch_size > 0, "batch_size must be positive");

        let selected = self
            .selector
            .select(docs, paths)
            .with_context(|| format!("invalid traversal path {paths:?}"))?;

        let mut targets: Vec<(DocId, &str)> = Vec::with_capacity(selected.len());
        for id in &selected {
            let doc = docs
                .get(*id)
                .with_context(|| format!("selector returned unknown document {id:?}"))?;
            if doc.has_text() {
                targets.push((*id, doc.text.as_deref().unwrap_or_default()));
            }
        }

        let dim = self.embedder.dimensions();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(targets.len());
        let mut batches = 0;
        for batch in targets.chunks(batch_size) {
            let texts: Vec<&str> = batch.iter().map(|(_, text)| *text).collect();
            let out = self
                .embedder
                .embed_batch(&texts)
                .with_context(|| format!("inference failed on batch {batches}"))?;
            anyhow::ensure!(
                out.len() == batch.len(),
                "embedder returned {} vectors for {} texts",
                out.len(),
                batch.len()
            );
            if let Some(bad) = out.iter().find(|v| v.len() != dim) {
                anyhow::bail!("embedder returned a {}-dim vector, expected {dim}", bad.len());
            }
            vectors.extend(out);
            batches += 1;
        }

        let ids: Vec<DocId> = targets.iter().map(|(id, _)| *id).collect();
        for (id, vector) in ids.iter().zip(vectors) {
            if let Some(doc) = docs.get_mut(*id) {
                doc.embedding = Some(vector);
            }
        }

        let summary = EncodeSummary {
            selected: selected.len(),
            encoded: ids.len(),
            skipped: selected.len() - ids.len(),
            batches,
        };
        tracing::debug!(
            paths,
            batch_size,
            selected = summary.selected,
            encoded = summary.encoded,
            skipped = summary.skipped,
            batches,
            "documents encoded"
        );
        Ok(summary)
    }
}

/// Read a JSON array of document trees from `input`, encode it and return
/// the result as pretty-printed JSON.
pub fn encode_json(
    encoder: &TextEmbeddingEncoder,
    mut input: impl Read,
    parameters: &EncodeParameters,
) -> Result<(String, EncodeSummary)> {
    let mut raw = String::new();
    input
        .read_to_string(&mut raw)
        .context("failed to read documents")?;
    let trees: Vec<DocumentTree> =
        serde_json::from_str(&raw).context("input must be a JSON array of documents")?;
    let mut docs = DocumentArray::from_trees(trees);

    let summary = encoder.encode(Some(&mut docs), parameters)?;
    let json = serde_json::to_string_pretty(&docs.to_trees())?;
    Ok((json, summary))
}
