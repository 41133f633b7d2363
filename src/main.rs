mod cli;

use std::path::PathBuf;

use anyhow::Result;
use audioclip_text::config::{self, AudioclipConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "audioclip-text", version, about = "AudioCLIP text embeddings for document collections")]
struct Cli {
    /// Config file (default: ~/.audioclip/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a JSON array of documents and write it back with embeddings
    Encode(cli::encode::EncodeArgs),
    /// Manage the model artifacts
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Show configuration and model artifact status
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download missing model and tokenizer files to the configured paths
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AudioclipConfig::load_from(path)?,
        None => AudioclipConfig::load_from(config::default_config_path())?,
    };

    // Log to stderr so stdout stays clean for encoded JSON.
    let filter = EnvFilter::try_new(&config.log.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Encode(args) => {
            cli::encode::encode(&config, args).await?;
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.encoder).await?;
            }
        },
        Command::Doctor => {
            cli::doctor::doctor(&config);
        }
    }

    Ok(())
}
