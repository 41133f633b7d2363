//! CLI `encode` command: read documents as JSON, attach embeddings, write JSON.

use anyhow::{Context, Result};
use clap::Args;
use std::io::Read;
use std::path::PathBuf;

use audioclip_text::config::AudioclipConfig;
use audioclip_text::encoder::{encode_json, EncodeParameters, TextEmbeddingEncoder};

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// JSON file holding an array of documents (`-` for stdin)
    pub input: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the configured traversal paths (e.g. "@c" or "@cc,r")
    #[arg(long)]
    pub traversal_paths: Option<String>,

    /// Override the configured batch size
    #[arg(long)]
    pub batch_size: Option<usize>,
}

pub async fn encode(config: &AudioclipConfig, args: EncodeArgs) -> Result<()> {
    let input: Box<dyn Read + Send> = if args.input.as_os_str() == "-" {
        Box::new(std::io::stdin())
    } else {
        Box::new(
            std::fs::File::open(&args.input)
                .with_context(|| format!("failed to read {}", args.input.display()))?,
        )
    };

    let encoder = TextEmbeddingEncoder::load(config.encoder.clone()).await?;
    let parameters = EncodeParameters {
        traversal_paths: args.traversal_paths,
        batch_size: args.batch_size,
    };

    let (json, summary) =
        tokio::task::spawn_blocking(move || encode_json(&encoder, input, &parameters))
            .await??;

    tracing::info!(
        selected = summary.selected,
        encoded = summary.encoded,
        skipped = summary.skipped,
        batches = summary.batches,
        "encode finished"
    );

    match args.output {
        Some(path) => std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
