//! Voice connection establishment and repair.
//!
//! [`ConnectionManager::ensure_connection`] guarantees that a guild's connection
//! targets the recorded channel and is live before anything is played on it.
//! Voice gateways routinely close mid-handshake under load, so transient
//! failures are retried a bounded number of times with a fixed backoff while
//! anything else is surfaced immediately.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{
    coordinator::CompletionHook,
    sink::PlaybackError,
    state::TenantState,
};

#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// Transport closed during the handshake; expected to clear up on retry
    #[error("voice transport closed during handshake: {0}")]
    Transient(String),

    #[error("voice connection failed: {0}")]
    Fatal(String),

    #[error("no target voice channel recorded for this guild")]
    NoTargetChannel,

    #[error("gave up after {attempts} connection attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ConnectionError>,
    },

    #[error("unable to establish a voice connection")]
    Unestablished,
}

impl ConnectionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// What the connection is doing with its current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Playing or paused: a track occupies the connection.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Handle to a live (or recently live) voice connection for one guild.
#[async_trait]
pub trait VoiceConnection: Send + Sync + 'static {
    type Source: Send + 'static;

    async fn is_connected(&self) -> bool;

    async fn current_channel(&self) -> Option<ChannelId>;

    /// Waits up to `grace` for an automatic reconnect already in flight.
    async fn wait_until_connected(&self, grace: Duration) -> bool;

    async fn move_to(&self, channel: ChannelId) -> Result<(), ConnectionError>;

    async fn disconnect(&self) -> Result<(), ConnectionError>;

    /// Starts `source`; `on_complete` fires once when it ends or fails.
    async fn play(
        &self,
        source: Self::Source,
        on_complete: CompletionHook,
    ) -> Result<(), PlaybackError>;

    async fn playback_state(&self) -> PlaybackState;

    async fn pause(&self) -> Result<(), PlaybackError>;

    async fn resume(&self) -> Result<(), PlaybackError>;

    /// Ends the current track; its completion hook still fires.
    async fn stop_current(&self) -> Result<(), PlaybackError>;
}

/// Platform binding able to open a fresh connection to a channel.
#[async_trait]
pub trait VoiceGateway: Send + Sync + 'static {
    type Connection: VoiceConnection;

    async fn connect(
        &self,
        tenant: GuildId,
        channel: ChannelId,
    ) -> Result<Arc<Self::Connection>, ConnectionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    /// How long the connection may take to finish its own reconnect
    pub reconnect_grace: Duration,
    /// Hard cap on the grace wait
    pub reconnect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            reconnect_grace: Duration::from_secs(5),
            reconnect_timeout: Duration::from_secs(6),
        }
    }
}

/// Next step after a failed attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    RetryAfterBackoff,
    GiveUp(ConnectionError),
}

/// Attempt counter plus the last transient error seen.
#[derive(Debug)]
pub struct ConnectAttempts {
    max: u32,
    made: u32,
    last_error: Option<ConnectionError>,
}

impl ConnectAttempts {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            made: 0,
            last_error: None,
        }
    }

    /// Claims the next attempt, returning its 1-based number.
    pub fn begin(&mut self) -> Option<u32> {
        if self.made >= self.max {
            return None;
        }
        self.made += 1;
        Some(self.made)
    }

    pub fn fail(&mut self, err: ConnectionError) -> AttemptOutcome {
        if !err.is_transient() {
            return AttemptOutcome::GiveUp(err);
        }

        self.last_error = Some(err);
        if self.made < self.max {
            AttemptOutcome::RetryAfterBackoff
        } else {
            AttemptOutcome::GiveUp(self.exhausted_error())
        }
    }

    pub fn made(&self) -> u32 {
        self.made
    }

    /// Error for a loop that ran out of attempts. Falls back to
    /// [`ConnectionError::Unestablished`] when nothing was recorded.
    pub fn exhausted_error(&mut self) -> ConnectionError {
        match self.last_error.take() {
            Some(last) => ConnectionError::RetriesExhausted {
                attempts: self.made,
                last: Box::new(last),
            },
            None => ConnectionError::Unestablished,
        }
    }
}

pub struct ConnectionManager<G: VoiceGateway> {
    gateway: G,
    policy: RetryPolicy,
}

impl<G: VoiceGateway> ConnectionManager<G> {
    pub fn new(gateway: G, policy: RetryPolicy) -> Self {
        Self { gateway, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns a connected handle for the state's target channel, repairing
    /// or creating it as needed. The caller must hold the tenant lock.
    pub async fn ensure_connection(
        &self,
        tenant: GuildId,
        state: &mut TenantState<G::Connection>,
    ) -> Result<Arc<G::Connection>, ConnectionError> {
        let target = state
            .target_channel
            .ok_or(ConnectionError::NoTargetChannel)?;

        if let Some(conn) = state.connection.clone() {
            if conn.current_channel().await == Some(target) {
                if conn.is_connected().await {
                    return Ok(conn);
                }

                debug!(
                    "⏳ Esperando reconexión en curso en guild {} (canal {})",
                    tenant, target
                );
                let recovered = tokio::time::timeout(
                    self.policy.reconnect_timeout,
                    conn.wait_until_connected(self.policy.reconnect_grace),
                )
                .await
                .unwrap_or(false);

                if recovered {
                    info!("🔄 Conexión de voz recuperada por sí sola en guild {}", tenant);
                    return Ok(conn);
                }
            }
        }

        let mut attempts = ConnectAttempts::new(self.policy.max_attempts);
        while let Some(attempt) = attempts.begin() {
            match self.try_connect(tenant, target, state).await {
                Ok(conn) => {
                    info!(
                        "🔊 Conectado al canal de voz en guild {} (canal {}, intento {}/{})",
                        tenant, target, attempt, self.policy.max_attempts
                    );
                    state.connection = Some(conn.clone());
                    return Ok(conn);
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!(
                            "⚠️ Gateway de voz cerrado al conectar a {} en guild {} (intento {}/{}): {}",
                            target, tenant, attempt, self.policy.max_attempts, err
                        );
                    } else {
                        error!(
                            "❌ Falló la conexión de voz en guild {} en el intento {}: {}",
                            tenant, attempt, err
                        );
                    }

                    match attempts.fail(err) {
                        AttemptOutcome::RetryAfterBackoff => {
                            tokio::time::sleep(self.policy.backoff).await
                        }
                        AttemptOutcome::GiveUp(err) => return Err(err),
                    }
                }
            }
        }

        Err(attempts.exhausted_error())
    }

    /// One connect/move/reconnect step against whatever handle exists now.
    async fn try_connect(
        &self,
        tenant: GuildId,
        target: ChannelId,
        state: &mut TenantState<G::Connection>,
    ) -> Result<Arc<G::Connection>, ConnectionError> {
        let Some(conn) = state.connection.clone() else {
            return self.gateway.connect(tenant, target).await;
        };

        if conn.current_channel().await != Some(target) {
            conn.move_to(target).await?;
            return Ok(conn);
        }

        if !conn.is_connected().await {
            // el transporte ya está caído; un leave fallido no debe bloquear la reconexión
            if let Err(e) = conn.disconnect().await {
                warn!(
                    "⚠️ No se pudo cerrar la conexión muerta en guild {}: {}",
                    tenant, e
                );
            }
            state.connection = None;
            return self.gateway.connect(tenant, target).await;
        }

        Ok(conn)
    }
}
