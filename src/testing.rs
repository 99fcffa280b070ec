//! In-memory voice gateway, connection and sink used by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::audio::{
    CodecOptions, CompletionHook, ConnectionError, Notifier, OutputSink, PlaybackError,
    PlaybackState, VoiceConnection, VoiceGateway,
};

pub const TENANT: GuildId = GuildId::new(1);
pub const VOICE_A: ChannelId = ChannelId::new(10);
pub const VOICE_B: ChannelId = ChannelId::new(20);

/// Polls `cond` until it holds, panicking after a couple of seconds.
pub async fn eventually(cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

pub struct FakeConnection {
    channel: Mutex<Option<ChannelId>>,
    connected: AtomicBool,
    recovers_on_wait: AtomicBool,
    stalls_on_wait: AtomicBool,
    fails_disconnect: AtomicBool,
    state: Mutex<PlaybackState>,
    hook: Mutex<Option<CompletionHook>>,
    played: Mutex<Vec<String>>,
    busy_play_calls: AtomicU32,
    disconnect_calls: AtomicU32,
}

impl FakeConnection {
    fn new(channel: ChannelId) -> Self {
        Self {
            channel: Mutex::new(Some(channel)),
            connected: AtomicBool::new(true),
            recovers_on_wait: AtomicBool::new(false),
            stalls_on_wait: AtomicBool::new(false),
            fails_disconnect: AtomicBool::new(false),
            state: Mutex::new(PlaybackState::Idle),
            hook: Mutex::new(None),
            played: Mutex::new(Vec::new()),
            busy_play_calls: AtomicU32::new(0),
            disconnect_calls: AtomicU32::new(0),
        }
    }

    /// Simulates the transport dropping; `recovers` decides whether the
    /// built-in reconnect succeeds during the grace window.
    pub fn drop_transport(&self, recovers: bool) {
        self.connected.store(false, Ordering::SeqCst);
        self.recovers_on_wait.store(recovers, Ordering::SeqCst);
    }

    /// Transport dropped and the driver's reconnect never settles.
    pub fn stall_transport(&self) {
        self.drop_transport(false);
        self.stalls_on_wait.store(true, Ordering::SeqCst);
    }

    /// Makes `disconnect` fail the way songbird does once the gateway link is gone.
    pub fn fail_disconnects(&self) {
        self.fails_disconnect.store(true, Ordering::SeqCst);
    }

    /// Ends the current track the way the voice driver would.
    pub fn finish(&self, error: Option<PlaybackError>) {
        *self.state.lock() = PlaybackState::Idle;
        if let Some(hook) = self.hook.lock().take() {
            hook.fire(error);
        }
    }

    /// Goes idle without firing the completion hook.
    pub fn set_idle(&self) {
        *self.state.lock() = PlaybackState::Idle;
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    pub fn busy_play_calls(&self) -> u32 {
        self.busy_play_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    type Source = String;

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn current_channel(&self) -> Option<ChannelId> {
        *self.channel.lock()
    }

    async fn wait_until_connected(&self, grace: Duration) -> bool {
        if self.recovers_on_wait.load(Ordering::SeqCst) {
            self.connected.store(true, Ordering::SeqCst);
            return true;
        }
        if self.stalls_on_wait.load(Ordering::SeqCst) {
            tokio::time::sleep(grace * 100).await;
            return false;
        }
        tokio::time::sleep(grace).await;
        false
    }

    async fn move_to(&self, channel: ChannelId) -> Result<(), ConnectionError> {
        *self.channel.lock() = Some(channel);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fails_disconnect.load(Ordering::SeqCst) {
            return Err(ConnectionError::Fatal("no gateway sender".into()));
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn play(&self, source: String, on_complete: CompletionHook) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        if state.is_active() {
            self.busy_play_calls.fetch_add(1, Ordering::SeqCst);
        }
        *state = PlaybackState::Playing;
        self.played.lock().push(source);
        *self.hook.lock() = Some(on_complete);
        Ok(())
    }

    async fn playback_state(&self) -> PlaybackState {
        *self.state.lock()
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
        *self.state.lock() = PlaybackState::Paused;
        Ok(())
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        *self.state.lock() = PlaybackState::Playing;
        Ok(())
    }

    async fn stop_current(&self) -> Result<(), PlaybackError> {
        self.finish(None);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeGateway {
    script: Arc<Mutex<VecDeque<Result<(), ConnectionError>>>>,
    connect_calls: Arc<AtomicU32>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes for the next connects, in order; unscripted connects succeed.
    pub fn script_connects(&self, outcomes: impl IntoIterator<Item = Result<(), ConnectionError>>) {
        self.script.lock().extend(outcomes);
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    type Connection = FakeConnection;

    async fn connect(
        &self,
        _tenant: GuildId,
        channel: ChannelId,
    ) -> Result<Arc<FakeConnection>, ConnectionError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().pop_front().unwrap_or(Ok(()));
        outcome.map(|()| Arc::new(FakeConnection::new(channel)))
    }
}

/// Sink whose sources are just the locators; some locators can be made to fail.
pub struct FakeSink {
    failing: HashSet<String>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
        }
    }

    pub fn failing<'a>(locators: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            failing: locators.into_iter().map(str::to_string).collect(),
        }
    }
}

#[async_trait]
impl OutputSink for FakeSink {
    type Source = String;

    async fn open_stream(
        &self,
        locator: &str,
        _options: &CodecOptions,
    ) -> Result<String, PlaybackError> {
        if self.failing.contains(locator) {
            return Err(PlaybackError::Stream(format!("cannot open {}", locator)));
        }
        Ok(locator.to_string())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, text: String) {
        self.messages.lock().push(text);
    }
}
