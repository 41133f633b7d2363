pub mod doctor;
pub mod encode;

use anyhow::Result;

use audioclip_text::config::EncoderConfig;
use audioclip_text::model;

/// Download the ONNX text head and tokenizer to their configured paths.
pub async fn model_download(config: &EncoderConfig) -> Result<()> {
    for artifact in model::artifacts(config) {
        if artifact.path.exists() {
            println!("{} already exists at {}", artifact.name, artifact.path.display());
        }
    }

    let fetched = model::download_missing(config, true).await?;
    if fetched == 0 {
        println!("Nothing to download.");
    } else {
        println!("Downloaded {fetched} file(s). Ready for use.");
    }
    Ok(())
}
