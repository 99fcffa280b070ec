use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;
use songbird::input::{HttpRequest, Input};
use std::time::Duration;
use tracing::debug;

use crate::audio::{CodecOptions, OutputSink, PlaybackError};

/// A songbird input plus the bitrate it should be encoded at.
pub struct StreamSource {
    pub input: Input,
    pub bitrate: i32,
}

/// Streams tracks over HTTP; songbird decodes them through symphonia.
pub struct HttpStreamSink {
    client: reqwest::Client,
}

impl HttpStreamSink {
    pub fn new() -> Result<Self> {
        // Sin timeout total: cortaría los tracks largos
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl OutputSink for HttpStreamSink {
    type Source = StreamSource;

    async fn open_stream(
        &self,
        locator: &str,
        options: &CodecOptions,
    ) -> Result<StreamSource, PlaybackError> {
        let url = Url::parse(locator)
            .map_err(|e| PlaybackError::Stream(format!("invalid stream url: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PlaybackError::Stream(format!(
                "unsupported stream scheme: {}",
                url.scheme()
            )));
        }

        debug!("🎯 Abriendo stream HTTP a {} kbps", options.bitrate / 1000);
        let request = HttpRequest::new(self.client.clone(), url.to_string());

        Ok(StreamSource {
            input: Input::from(request),
            bitrate: options.bitrate,
        })
    }
}
