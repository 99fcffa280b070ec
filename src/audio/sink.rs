use async_trait::async_trait;
use thiserror::Error;

/// Failures that affect a single track, never the whole queue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    /// The stream could not be opened or decoded
    #[error("stream error: {0}")]
    Stream(String),

    /// The connection refused to start playback
    #[error("dispatch error: {0}")]
    Dispatch(String),

    #[error("voice connection is not established")]
    NotConnected,
}

/// Encoder settings passed through to the output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Opus bitrate in bits per second
    pub bitrate: i32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self { bitrate: 96_000 }
    }
}

/// Turns a stream locator into something a voice connection can play.
#[async_trait]
pub trait OutputSink: Send + Sync + 'static {
    type Source: Send + 'static;

    async fn open_stream(
        &self,
        locator: &str,
        options: &CodecOptions,
    ) -> Result<Self::Source, PlaybackError>;
}

/// Fire-and-forget text notifications back to whoever asked for the music.
///
/// Implementations must not block and must swallow (log) their own failures.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, text: String);
}
