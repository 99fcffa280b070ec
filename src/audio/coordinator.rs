//! Queue advancement for every guild.
//!
//! [`PlaybackCoordinator`] is the only component that pops from a guild's
//! queue or tells a connection to play. Requests enter through
//! [`PlaybackCoordinator::enqueue_and_maybe_start`]; track completions come
//! back through a [`CompletionHook`], which posts a [`Completion`] message to
//! the coordinator's own task instead of touching guild state from the voice
//! driver's thread.

use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{
    connection::{
        ConnectionError, ConnectionManager, PlaybackState, RetryPolicy, VoiceConnection,
        VoiceGateway,
    },
    sink::{CodecOptions, Notifier, OutputSink, PlaybackError},
    state::{TenantRegistry, TenantState},
    track::Track,
};

/// Source type played by a gateway's connections.
pub type SourceOf<G> = <<G as VoiceGateway>::Connection as VoiceConnection>::Source;

/// Result of an enqueue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Started,
    Queued,
}

/// What a single `advance` pass ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Track dispatched to the connection
    Playing(Track),
    /// Connection already busy with a track
    Busy,
    /// Queue empty; connection released
    Drained,
    NoTarget,
    ConnectionFailed,
}

/// A finished (or failed) track, posted back to the coordinator.
pub struct Completion {
    pub tenant: GuildId,
    pub title: String,
    pub error: Option<PlaybackError>,
    pub notifier: Arc<dyn Notifier>,
}

/// Handed to [`VoiceConnection::play`]; fires at most once per track.
///
/// Firing only enqueues a message, so it is safe from any thread.
#[derive(Clone)]
pub struct CompletionHook {
    tenant: GuildId,
    title: String,
    notifier: Arc<dyn Notifier>,
    tx: mpsc::UnboundedSender<Completion>,
    fired: Arc<AtomicBool>,
}

impl CompletionHook {
    pub fn tenant(&self) -> GuildId {
        self.tenant
    }

    pub fn fire(&self, error: Option<PlaybackError>) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }

        let completion = Completion {
            tenant: self.tenant,
            title: self.title.clone(),
            error,
            notifier: self.notifier.clone(),
        };
        if self.tx.send(completion).is_err() {
            debug!(
                "Coordinador detenido, descartando fin de track para guild {}",
                self.tenant
            );
        }
    }
}

pub struct PlaybackCoordinator<G, S>
where
    G: VoiceGateway,
    S: OutputSink<Source = SourceOf<G>>,
{
    registry: TenantRegistry<G::Connection>,
    connections: ConnectionManager<G>,
    sink: S,
    codec: CodecOptions,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<G, S> PlaybackCoordinator<G, S>
where
    G: VoiceGateway,
    S: OutputSink<Source = SourceOf<G>>,
{
    /// Builds the coordinator and spawns its completion consumer.
    ///
    /// Must be called from inside a tokio runtime. The consumer exits once the
    /// returned coordinator is dropped.
    pub fn spawn(gateway: G, sink: S, policy: RetryPolicy, codec: CodecOptions) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(Self {
            registry: TenantRegistry::new(),
            connections: ConnectionManager::new(gateway, policy),
            sink,
            codec,
            completions: tx,
        });

        tokio::spawn(Self::run_completions(Arc::downgrade(&coordinator), rx));
        coordinator
    }

    pub fn registry(&self) -> &TenantRegistry<G::Connection> {
        &self.registry
    }

    /// Queues `track` for the guild and starts playback if the connection is idle.
    ///
    /// Connection failures propagate to the caller; the track is not queued then.
    pub async fn enqueue_and_maybe_start(
        &self,
        tenant: GuildId,
        track: Track,
        channel: ChannelId,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Decision, ConnectionError> {
        let shared = self.registry.get_or_create(tenant);
        let mut state = shared.lock().await;

        state.target_channel = Some(channel);
        let conn = self.connections.ensure_connection(tenant, &mut state).await?;

        info!("➕ Agregado a la cola en guild {}: {}", tenant, track);
        state.queue.push_back(track);

        if conn.playback_state().await.is_active() {
            return Ok(Decision::Queued);
        }

        self.advance_locked(tenant, &mut state, notifier).await;
        Ok(Decision::Started)
    }

    /// Plays the next queued track, or releases the connection when nothing is left.
    ///
    /// Failures are logged, never returned: nobody is waiting on a
    /// completion-driven pass.
    pub async fn advance(&self, tenant: GuildId, notifier: Arc<dyn Notifier>) -> Advance {
        let shared = self.registry.get_or_create(tenant);
        let mut state = shared.lock().await;
        self.advance_locked(tenant, &mut state, notifier).await
    }

    async fn advance_locked(
        &self,
        tenant: GuildId,
        state: &mut TenantState<G::Connection>,
        notifier: Arc<dyn Notifier>,
    ) -> Advance {
        if state.target_channel.is_none() {
            warn!("Sin canal de voz registrado para guild {}; abortando reproducción", tenant);
            return Advance::NoTarget;
        }

        let conn = match self.connections.ensure_connection(tenant, state).await {
            Ok(conn) => conn,
            Err(e) => {
                error!("❌ No se pudo asegurar la conexión de voz para guild {}: {}", tenant, e);
                return Advance::ConnectionFailed;
            }
        };

        if conn.playback_state().await.is_active() {
            debug!("Guild {} ya está reproduciendo, nada que despachar", tenant);
            return Advance::Busy;
        }

        while let Some(track) = state.queue.pop_front() {
            match self.dispatch(tenant, &conn, &track, notifier.clone()).await {
                Ok(()) => {
                    info!("🎵 Reproduciendo en guild {}: {}", tenant, track);
                    notifier.notify(format!("Now playing: **{}**", track.title()));
                    return Advance::Playing(track);
                }
                Err(e) => {
                    warn!("⏭️ No se pudo reproducir {} en guild {}: {}", track, tenant, e);
                    notifier.notify(format!("Could not play **{}**", track.title()));
                }
            }
        }

        if conn.is_connected().await {
            if let Err(e) = conn.disconnect().await {
                warn!("Error al salir del canal de voz en guild {}: {}", tenant, e);
            }
        }
        state.reset();
        info!("📭 Cola vacía en guild {}, conexión de voz liberada", tenant);
        Advance::Drained
    }

    async fn dispatch(
        &self,
        tenant: GuildId,
        conn: &Arc<G::Connection>,
        track: &Track,
        notifier: Arc<dyn Notifier>,
    ) -> Result<(), PlaybackError> {
        let source = self.sink.open_stream(track.locator(), &self.codec).await?;
        let hook = CompletionHook {
            tenant,
            title: track.title().to_string(),
            notifier,
            tx: self.completions.clone(),
            fired: Arc::new(AtomicBool::new(false)),
        };
        conn.play(source, hook).await
    }

    /// Pauses a playing track. Returns whether anything was paused.
    pub async fn pause(&self, tenant: GuildId) -> bool {
        self.control(tenant, |state| state == PlaybackState::Playing, |conn| async move {
            conn.pause().await
        })
        .await
    }

    /// Resumes a paused track. Returns whether anything was resumed.
    pub async fn resume(&self, tenant: GuildId) -> bool {
        self.control(tenant, |state| state == PlaybackState::Paused, |conn| async move {
            conn.resume().await
        })
        .await
    }

    /// Ends the current track; the regular completion path advances the queue.
    pub async fn skip(&self, tenant: GuildId) -> bool {
        self.control(tenant, |state| state.is_active(), |conn| async move {
            conn.stop_current().await
        })
        .await
    }

    /// Clears the queue and releases the connection. Returns false when the
    /// guild had nothing queued, targeted or connected.
    pub async fn stop(&self, tenant: GuildId) -> bool {
        let Some(shared) = self.registry.get(tenant) else {
            return false;
        };
        let mut state = shared.lock().await;

        let had_session = !state.is_idle();
        let Some(conn) = state.reset() else {
            if had_session {
                info!("⏹️ Cola descartada en guild {} (sin conexión de voz)", tenant);
            }
            return had_session;
        };

        if let Err(e) = conn.stop_current().await {
            debug!("Nada que detener en guild {}: {}", tenant, e);
        }
        if let Err(e) = conn.disconnect().await {
            warn!("Error al salir del canal de voz en guild {}: {}", tenant, e);
        }
        info!("⏹️ Reproducción detenida en guild {}", tenant);
        true
    }

    async fn control<F, Fut>(
        &self,
        tenant: GuildId,
        applies: impl FnOnce(PlaybackState) -> bool,
        action: F,
    ) -> bool
    where
        F: FnOnce(Arc<G::Connection>) -> Fut,
        Fut: std::future::Future<Output = Result<(), PlaybackError>>,
    {
        let Some(shared) = self.registry.get(tenant) else {
            return false;
        };
        let state = shared.lock().await;
        let Some(conn) = state.connection.clone() else {
            return false;
        };

        if !applies(conn.playback_state().await) {
            return false;
        }

        match action(conn).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Error en control de reproducción en guild {}: {}", tenant, e);
                false
            }
        }
    }

    async fn run_completions(this: Weak<Self>, mut rx: mpsc::UnboundedReceiver<Completion>) {
        while let Some(done) = rx.recv().await {
            let Some(coordinator) = this.upgrade() else {
                break;
            };

            match &done.error {
                Some(e) => error!("❌ Error al reproducir {} en guild {}: {}", done.title, done.tenant, e),
                None => debug!("✅ Terminado {} en guild {}", done.title, done.tenant),
            }

            tokio::spawn(async move {
                coordinator.advance(done.tenant, done.notifier).await;
            });
        }
        debug!("Consumidor de fin de tracks detenido");
    }
}
