//! CLI `doctor` command: print configuration and artifact status.

use audioclip_text::config::AudioclipConfig;
use audioclip_text::model;

pub fn doctor(config: &AudioclipConfig) {
    let enc = &config.encoder;

    println!("AudioCLIP Text Encoder");
    println!("======================");
    println!();
    println!("Device:            {}", enc.device);
    println!("Batch size:        {}", enc.batch_size);
    println!("Traversal paths:   {}", enc.traversal_paths);
    println!("Context length:    {}", enc.max_length);
    println!("Download enabled:  {}", enc.download_model);
    println!();

    let mut missing = 0;
    for artifact in model::artifacts(enc) {
        match artifact.size() {
            Some(size) => println!(
                "{:<18} {} ({})",
                format!("{}:", artifact.name),
                artifact.path.display(),
                format_bytes(size)
            ),
            None => {
                missing += 1;
                println!(
                    "{:<18} MISSING at {}",
                    format!("{}:", artifact.name),
                    artifact.path.display()
                );
            }
        }
    }

    if missing > 0 {
        println!();
        println!("Run `audioclip-text model download` (with model_url/tokenizer_url set)");
        println!("or place the files at the paths above.");
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::format_bytes;

    #[test]
    fn formats_sizes() {
        assert_eq!(format_bytes(12), "12 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
