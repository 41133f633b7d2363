use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::embedding::device::Device;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AudioclipConfig {
    pub log: LogConfig,
    pub encoder: EncoderConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

/// Construction-time settings for the text encoder. Fixed for the lifetime of
/// an encoder instance; per-call overrides go through `EncodeParameters`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EncoderConfig {
    pub model_path: String,
    pub tokenizer_path: String,
    pub device: String,
    pub batch_size: usize,
    pub traversal_paths: String,
    pub download_model: bool,
    pub model_url: Option<String>,
    pub tokenizer_url: Option<String>,
    pub max_length: usize,
    pub intra_threads: usize,
    pub normalize: bool,
    pub input_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        let models = default_audioclip_dir().join("models");
        Self {
            model_path: models
                .join("audioclip-text.onnx")
                .to_string_lossy()
                .into_owned(),
            tokenizer_path: models.join("tokenizer.json").to_string_lossy().into_owned(),
            device: "cpu".into(),
            batch_size: 32,
            traversal_paths: "@r".into(),
            download_model: false,
            model_url: None,
            tokenizer_url: None,
            max_length: 77,
            intra_threads: 4,
            normalize: false,
            input_name: "input_ids".into(),
        }
    }
}

impl EncoderConfig {
    /// Check values that would otherwise only fail deep inside a call.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.batch_size > 0, "batch_size must be positive");
        anyhow::ensure!(self.max_length > 0, "max_length must be positive");
        anyhow::ensure!(self.intra_threads > 0, "intra_threads must be positive");
        anyhow::ensure!(
            !self.traversal_paths.trim().is_empty(),
            "traversal_paths must not be empty"
        );
        self.parsed_device()?;
        Ok(())
    }

    pub fn parsed_device(&self) -> Result<Device> {
        self.device
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
    }

    pub fn resolved_model_path(&self) -> PathBuf {
        expand_tilde(&self.model_path)
    }

    pub fn resolved_tokenizer_path(&self) -> PathBuf {
        expand_tilde(&self.tokenizer_path)
    }
}

/// Returns `~/.audioclip/`
pub fn default_audioclip_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".audioclip")
}

/// Returns the default config file path: `~/.audioclip/config.toml`
pub fn default_config_path() -> PathBuf {
    default_audioclip_dir().join("config.toml")
}

impl AudioclipConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            AudioclipConfig::default()
        };

        config.apply_env_overrides();
        config.encoder.validate().context("invalid [encoder] config")?;
        Ok(config)
    }

    /// Apply environment variable overrides (AUDIOCLIP_MODEL_PATH,
    /// AUDIOCLIP_TOKENIZER_PATH, AUDIOCLIP_DEVICE, AUDIOCLIP_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AUDIOCLIP_MODEL_PATH") {
            self.encoder.model_path = val;
        }
        if let Ok(val) = std::env::var("AUDIOCLIP_TOKENIZER_PATH") {
            self.encoder.tokenizer_path = val;
        }
        if let Ok(val) = std::env::var("AUDIOCLIP_DEVICE") {
            self.encoder.device = val;
        }
        if let Ok(val) = std::env::var("AUDIOCLIP_LOG_LEVEL") {
            self.log.level = val;
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
