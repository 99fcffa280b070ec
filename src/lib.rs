//! Guild Jukebox: a per-guild Discord music queue with resilient voice connections.

pub mod audio;
pub mod bot;
pub mod config;
pub mod sources;
pub mod voice;

#[cfg(test)]
mod testing;
