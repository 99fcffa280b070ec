use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::SearchProvider;
use crate::{audio::Track, config::Config};

/// One `--dump-json` line from yt-dlp.
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    title: Option<String>,
    /// URL directa del stream del formato elegido
    url: Option<String>,
}

/// Busca en YouTube usando el binario `yt-dlp`.
pub struct YtDlpSearch {
    binary: String,
    format: String,
    timeout: Duration,
}

impl YtDlpSearch {
    pub fn new(binary: impl Into<String>, format: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            format: format.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.ytdlp_path.clone(),
            config.ytdlp_format.clone(),
            Duration::from_secs(config.search_timeout_secs),
        )
    }

    async fn run(&self, query: &str) -> Result<String> {
        let search = format!("ytsearch1:{}", query);
        let output = Command::new(&self.binary)
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                "-f",
                self.format.as_str(),
                search.as_str(),
            ])
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parses yt-dlp JSON lines, skipping entries without a stream URL.
pub fn parse_entries(stdout: &str) -> Vec<Track> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Ignorando línea de yt-dlp no parseable: {}", e);
                None
            }
        })
        .filter_map(|entry| {
            let url = entry.url?;
            let title = entry.title.unwrap_or_else(|| "Untitled".to_string());
            Some(Track::new(url, title))
        })
        .collect()
}

#[async_trait]
impl SearchProvider for YtDlpSearch {
    async fn search(&self, query: &str) -> Result<Vec<Track>> {
        info!("🔍 Buscando en yt-dlp: {}", query);

        let stdout = tokio::time::timeout(self.timeout, self.run(query))
            .await
            .with_context(|| format!("yt-dlp timed out after {:?}", self.timeout))??;

        let tracks = parse_entries(&stdout);
        debug!("yt-dlp devolvió {} entradas reproducibles", tracks.len());
        Ok(tracks)
    }
}
