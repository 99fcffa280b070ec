//! # Audio Module
//!
//! Per-guild playback orchestration for the bot.
//!
//! ## Architecture
//!
//! ### [`track`] - Track
//! - Immutable stream locator + display title
//!
//! ### [`state`] - Guild State
//! - FIFO queue, target voice channel and connection handle behind one lock
//! - Registry creating guild state lazily, race-free
//!
//! ### [`connection`] - Connections
//! - Connect / move / repair a guild's voice connection
//! - Bounded retry with fixed backoff on transient gateway closures
//!
//! ### [`coordinator`] - Playback
//! - Enqueue-or-start decision made atomically under the guild lock
//! - Completion-driven advancement through a message channel
//! - Pause / resume / skip / stop
//!
//! ### [`sink`] - External Seams
//! - Output sink turning locators into playable sources
//! - Fire-and-forget notifications
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_jukebox::audio::{CodecOptions, RetryPolicy, Track, PlaybackCoordinator};
//! use guild_jukebox::voice::{HttpStreamSink, SongbirdGateway};
//! use serenity::all::{ChannelId, GuildId};
//! # use std::sync::Arc;
//!
//! # async fn example(
//! #     songbird: Arc<songbird::Songbird>,
//! #     notifier: Arc<dyn guild_jukebox::audio::Notifier>,
//! # ) -> anyhow::Result<()> {
//! let coordinator = PlaybackCoordinator::spawn(
//!     SongbirdGateway::new(songbird),
//!     HttpStreamSink::new()?,
//!     RetryPolicy::default(),
//!     CodecOptions::default(),
//! );
//!
//! let guild = GuildId::new(123456789);
//! let track = Track::new("https://example.com/song.mp3", "Song");
//! coordinator
//!     .enqueue_and_maybe_start(guild, track, ChannelId::new(987654321), notifier)
//!     .await?;
//!
//! coordinator.pause(guild).await;
//! coordinator.resume(guild).await;
//! coordinator.skip(guild).await;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod coordinator;
pub mod sink;
pub mod state;
pub mod track;

pub use connection::{
    ConnectionError, ConnectionManager, PlaybackState, RetryPolicy, VoiceConnection, VoiceGateway,
};
pub use coordinator::{Advance, CompletionHook, Decision, PlaybackCoordinator};
pub use sink::{CodecOptions, Notifier, OutputSink, PlaybackError};
pub use state::{TenantRegistry, TenantState};
pub use track::Track;
