//! # Voice Module
//!
//! Songbird-backed implementations of the audio seams:
//!
//! - [`SongbirdGateway`] opens calls through the shared [`Songbird`] manager
//! - [`SongbirdConnection`] wraps one guild's [`Call`] and its current track
//! - [`HttpStreamSink`] turns stream URLs into songbird inputs
//!
//! Track end/error events from the voice driver only fire the
//! [`CompletionHook`]; they never touch guild state themselves.

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    driver::Bitrate,
    error::JoinError,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::audio::{
    CompletionHook, ConnectionError, PlaybackCoordinator, PlaybackError, PlaybackState,
    VoiceConnection, VoiceGateway,
};

pub mod sink;

pub use sink::{HttpStreamSink, StreamSource};

/// Coordinator wired to songbird and HTTP streams.
pub type Coordinator = PlaybackCoordinator<SongbirdGateway, HttpStreamSink>;

const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Maps songbird join failures onto retryable / fatal.
///
/// Dropped or timed-out handshakes and driver-level failures (the voice
/// websocket closing mid-handshake) are worth another attempt.
pub fn classify_join_error(err: JoinError) -> ConnectionError {
    match &err {
        JoinError::Dropped | JoinError::TimedOut | JoinError::Driver(_) => {
            ConnectionError::Transient(err.to_string())
        }
        _ => ConnectionError::Fatal(err.to_string()),
    }
}

pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    type Connection = SongbirdConnection;

    async fn connect(
        &self,
        tenant: GuildId,
        channel: ChannelId,
    ) -> Result<Arc<SongbirdConnection>, ConnectionError> {
        debug!("🔌 Uniéndose al canal de voz {} en guild {}", channel, tenant);
        let call = self
            .manager
            .join(tenant, channel)
            .await
            .map_err(classify_join_error)?;

        Ok(Arc::new(SongbirdConnection {
            manager: self.manager.clone(),
            guild: tenant,
            call,
            current: SyncMutex::new(None),
        }))
    }
}

pub struct SongbirdConnection {
    manager: Arc<Songbird>,
    guild: GuildId,
    call: Arc<Mutex<Call>>,
    current: SyncMutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    fn current_track(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    type Source = StreamSource;

    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_connection().is_some()
    }

    async fn current_channel(&self) -> Option<ChannelId> {
        self.call
            .lock()
            .await
            .current_channel()
            .map(|id| ChannelId::from(id.0))
    }

    async fn wait_until_connected(&self, grace: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            if self.is_connected().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(CONNECT_POLL_INTERVAL).await;
        }
    }

    async fn move_to(&self, channel: ChannelId) -> Result<(), ConnectionError> {
        info!("🔀 Moviendo al canal de voz {} en guild {}", channel, self.guild);
        // Volver a unirse con un call existente lo mueve
        self.manager
            .join(self.guild, channel)
            .await
            .map(|_| ())
            .map_err(classify_join_error)
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        self.current.lock().take();
        let mut call = self.call.lock().await;
        call.stop();
        call.leave().await.map_err(classify_join_error)?;
        info!("👋 Desconectado del canal de voz en guild {}", self.guild);
        Ok(())
    }

    async fn play(
        &self,
        source: StreamSource,
        on_complete: CompletionHook,
    ) -> Result<(), PlaybackError> {
        let handle = {
            let mut call = self.call.lock().await;
            if call.current_connection().is_none() {
                return Err(PlaybackError::NotConnected);
            }
            call.set_bitrate(Bitrate::BitsPerSecond(source.bitrate));
            call.play_input(source.input)
        };

        let ended = TrackCompletion {
            hook: on_complete.clone(),
        };
        let failed = TrackCompletion { hook: on_complete };
        handle
            .add_event(Event::Track(TrackEvent::End), ended)
            .and_then(|_| handle.add_event(Event::Track(TrackEvent::Error), failed))
            .map_err(|e| PlaybackError::Dispatch(e.to_string()))?;

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn playback_state(&self) -> PlaybackState {
        let Some(handle) = self.current_track() else {
            return PlaybackState::Idle;
        };

        match handle.get_info().await {
            Ok(info) => match info.playing {
                PlayMode::Play => PlaybackState::Playing,
                PlayMode::Pause => PlaybackState::Paused,
                _ => PlaybackState::Idle,
            },
            // El handle sobrevivió a su track
            Err(_) => PlaybackState::Idle,
        }
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
        let handle = self.current_track().ok_or(PlaybackError::NotConnected)?;
        handle
            .pause()
            .map_err(|e| PlaybackError::Dispatch(e.to_string()))
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        let handle = self.current_track().ok_or(PlaybackError::NotConnected)?;
        handle
            .play()
            .map_err(|e| PlaybackError::Dispatch(e.to_string()))
    }

    async fn stop_current(&self) -> Result<(), PlaybackError> {
        let handle = self.current_track().ok_or(PlaybackError::NotConnected)?;
        handle
            .stop()
            .map_err(|e| PlaybackError::Dispatch(e.to_string()))
    }
}

/// Forwards a track's end or error event to the coordinator.
struct TrackCompletion {
    hook: CompletionHook,
}

#[async_trait]
impl VoiceEventHandler for TrackCompletion {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(PlaybackError::Stream(format!("{:?}", e))),
                _ => None,
            }),
            _ => None,
        };

        debug!("🎵 Track terminado en guild {}", self.hook.tenant());
        self.hook.fire(error);
        None
    }
}
