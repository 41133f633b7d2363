//! AudioCLIP text encoder for document pipelines.
//!
//! Turns the text of documents in a nested collection into 1024-dimensional
//! embeddings using the frozen AudioCLIP text head, exported to ONNX and run
//! locally through ONNX Runtime. Vectors are attached to the documents in
//! place.
//!
//! ```no_run
//! use audioclip_text::config::EncoderConfig;
//! use audioclip_text::document::{Document, DocumentArray};
//! use audioclip_text::encoder::{EncodeParameters, TextEmbeddingEncoder};
//!
//! # fn main() -> anyhow::Result<()> {
//! let encoder = TextEmbeddingEncoder::new(EncoderConfig::default())?;
//! let mut docs = DocumentArray::new();
//! docs.push(Document::with_text("hello world"));
//! encoder.encode(Some(&mut docs), &EncodeParameters::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`document`]: Arena-backed nested documents, traversal paths and matching
//! - [`embedding`]: Text-to-vector pipeline via ONNX Runtime
//! - [`encoder`]: [`TextEmbeddingEncoder`](encoder::TextEmbeddingEncoder), the batch adapter
//! - [`model`]: Locating and downloading model artifacts

pub mod config;
pub mod document;
pub mod embedding;
pub mod encoder;
pub mod model;
