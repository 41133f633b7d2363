//! Model artifact management: locating and downloading the ONNX text head
//! and its tokenizer.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::EncoderConfig;

/// One file the encoder needs on disk.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: &'static str,
    pub path: PathBuf,
    pub url: Option<String>,
}

impl Artifact {
    /// File size in bytes, or `None` if the file is missing.
    pub fn size(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|m| m.len())
    }
}

/// The model and tokenizer artifacts for `config`.
pub fn artifacts(config: &EncoderConfig) -> [Artifact; 2] {
    [
        Artifact {
            name: "model",
            path: config.resolved_model_path(),
            url: config.model_url.clone(),
        },
        Artifact {
            name: "tokenizer",
            path: config.resolved_tokenizer_path(),
            url: config.tokenizer_url.clone(),
        },
    ]
}

/// Download every missing artifact. Files already on disk are left alone.
/// Returns the number of files fetched.
pub async fn download_missing(config: &EncoderConfig, progress: bool) -> Result<usize> {
    let mut fetched = 0;
    for artifact in artifacts(config) {
        if artifact.path.exists() {
            tracing::debug!(artifact = artifact.name, path = %artifact.path.display(), "artifact present");
            continue;
        }
        let url = artifact.url.as_deref().with_context(|| {
            format!(
                "{} missing at {} and no {}_url configured",
                artifact.name,
                artifact.path.display(),
                artifact.name
            )
        })?;
        if let Some(parent) = artifact.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        tracing::info!(artifact = artifact.name, %url, "downloading");
        download_file(url, &artifact.path, progress).await?;
        tracing::info!(artifact = artifact.name, path = %artifact.path.display(), "download complete");
        fetched += 1;
    }
    Ok(fetched)
}

/// Download a file from a URL, optionally with a progress bar. Uses an
/// atomic write (tmp + rename) so a failed download never leaves a partial
/// artifact at `dest`.
pub async fn download_file(url: &str, dest: &Path, progress: bool) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download of {url} failed with HTTP {}",
        response.status()
    );

    let pb = match (progress, response.content_length()) {
        (false, _) => ProgressBar::hidden(),
        (true, Some(size)) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                    .context("invalid progress template")?
                    .progress_chars("##-"),
            );
            pb
        }
        (true, None) => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    type Route = (&'static str, u16, &'static [u8]);

    /// Minimal HTTP/1.1 server on 127.0.0.1 answering each path with a fixed
    /// status and body. Returns the base URL.
    async fn serve(routes: Vec<Route>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let mut read = 0;
                    while read < buf.len() {
                        let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    let request = String::from_utf8_lossy(&buf[..read]).into_owned();
                    let path = request.split_whitespace().nth(1).unwrap_or("/");
                    let (status, body) = routes
                        .iter()
                        .find(|(p, _, _)| *p == path)
                        .map(|(_, s, b)| (*s, *b))
                        .unwrap_or((404, &b"not found"[..]));
                    let head = format!(
                        "HTTP/1.1 {status} Test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn config_in(dir: &Path) -> EncoderConfig {
        EncoderConfig {
            model_path: dir.join("model.onnx").to_string_lossy().into_owned(),
            tokenizer_path: dir.join("tokenizer.json").to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn artifacts_report_size() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        std::fs::write(tmp.path().join("tokenizer.json"), b"{}").unwrap();

        let [model, tokenizer] = artifacts(&config);
        assert_eq!(model.size(), None);
        assert_eq!(tokenizer.size(), Some(2));
    }

    #[tokio::test]
    async fn present_artifacts_are_not_fetched() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        std::fs::write(tmp.path().join("model.onnx"), b"x").unwrap();
        std::fs::write(tmp.path().join("tokenizer.json"), b"{}").unwrap();

        assert_eq!(download_missing(&config, false).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_artifact_without_url_fails() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());

        let err = download_missing(&config, false).await.unwrap_err();
        assert!(err.to_string().contains("no model_url configured"));
    }

    #[tokio::test]
    async fn missing_artifacts_are_downloaded() {
        let base = serve(vec![
            ("/model.onnx", 200, b"onnx-model-bytes"),
            ("/tokenizer.json", 200, b"{\"model\":{}}"),
        ])
        .await;
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("models");
        let config = EncoderConfig {
            model_url: Some(format!("{base}/model.onnx")),
            tokenizer_url: Some(format!("{base}/tokenizer.json")),
            ..config_in(&dir)
        };

        assert_eq!(download_missing(&config, false).await.unwrap(), 2);

        let model = dir.join("model.onnx");
        let tokenizer = dir.join("tokenizer.json");
        assert_eq!(std::fs::read(&model).unwrap(), b"onnx-model-bytes");
        assert_eq!(std::fs::read(&tokenizer).unwrap(), b"{\"model\":{}}");
        assert!(!model.with_extension("tmp").exists());
        assert!(!tokenizer.with_extension("tmp").exists());

        // second run finds both files in place
        assert_eq!(download_missing(&config, false).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn http_error_creates_no_file() {
        let base = serve(vec![("/model.onnx", 500, b"boom")]).await;
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");

        let err = download_file(&format!("{base}/model.onnx"), &dest, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"), "unexpected error: {err}");
        assert!(!dest.exists());
        assert!(!dest.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn failed_download_reports_missing_route() {
        let base = serve(vec![("/model.onnx", 200, b"m")]).await;
        let tmp = TempDir::new().unwrap();
        let config = EncoderConfig {
            model_url: Some(format!("{base}/model.onnx")),
            tokenizer_url: Some(format!("{base}/absent.json")),
            ..config_in(tmp.path())
        };

        let err = download_missing(&config, false).await.unwrap_err();
        assert!(err.to_string().contains("404"), "unexpected error: {err}");
        assert!(tmp.path().join("model.onnx").exists());
        assert!(!tmp.path().join("tokenizer.json").exists());
    }
}
