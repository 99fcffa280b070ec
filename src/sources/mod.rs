pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::audio::Track;

pub use ytdlp::YtDlpSearch;

/// Resolves free-text queries to playable tracks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Track>>;
}

/// Best match for `query`, or `None` when the provider found nothing.
pub async fn first_result(provider: &dyn SearchProvider, query: &str) -> Result<Option<Track>> {
    let track = provider.search(query).await?.into_iter().next();
    match &track {
        Some(track) => info!("🔍 '{}' resuelto como {}", query, track),
        None => info!("🔍 Sin resultados para '{}'", query),
    }
    Ok(track)
}
