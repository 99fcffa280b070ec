use serenity::{http::Http, model::id::ChannelId};
use std::sync::Arc;
use tracing::warn;

use crate::audio::Notifier;

/// Publica avisos de reproducción en el canal de texto del pedido.
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel: ChannelId,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        Self { http, channel }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, text: String) {
        let http = self.http.clone();
        let channel = self.channel;
        tokio::spawn(async move {
            if let Err(e) = channel.say(&http, text).await {
                warn!("No se pudo enviar notificación al canal {}: {:?}", channel, e);
            }
        });
    }
}
