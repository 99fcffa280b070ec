use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

use crate::audio::{CodecOptions, RetryPolicy};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Registers commands for a single guild when set

    // Audio
    pub opus_bitrate: i32,

    // Conexión de voz
    pub connect_attempts: u32,
    pub connect_backoff_ms: u64,
    pub reconnect_grace_secs: u64,
    pub reconnect_timeout_secs: u64,

    // Búsqueda
    pub ytdlp_path: String,
    pub ytdlp_format: String,
    pub search_timeout_secs: u64,
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}", key)),
        _ => Ok(default),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            opus_bitrate: env_or("OPUS_BITRATE", defaults.opus_bitrate)?,

            connect_attempts: env_or("CONNECT_ATTEMPTS", defaults.connect_attempts)?,
            connect_backoff_ms: env_or("CONNECT_BACKOFF_MS", defaults.connect_backoff_ms)?,
            reconnect_grace_secs: env_or("RECONNECT_GRACE_SECS", defaults.reconnect_grace_secs)?,
            reconnect_timeout_secs: env_or(
                "RECONNECT_TIMEOUT_SECS",
                defaults.reconnect_timeout_secs,
            )?,

            ytdlp_path: env_or("YTDLP_PATH", defaults.ytdlp_path)?,
            ytdlp_format: env_or("YTDLP_FORMAT", defaults.ytdlp_format)?,
            search_timeout_secs: env_or("SEARCH_TIMEOUT_SECS", defaults.search_timeout_secs)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Opus bitrate must be within 8kbps..=510kbps (Discord limits)
    /// - At least one connection attempt
    /// - The reconnect timeout must not be shorter than the grace window
    /// - Search timeout must be > 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.opus_bitrate > 510_000 {
            anyhow::bail!("Opus bitrate cannot exceed 510kbps, got: {}", self.opus_bitrate);
        }

        if self.opus_bitrate < 8_000 {
            anyhow::bail!("Opus bitrate too low, minimum 8kbps, got: {}", self.opus_bitrate);
        }

        if self.connect_attempts == 0 {
            anyhow::bail!("Connect attempts must be greater than 0");
        }

        if self.reconnect_timeout_secs < self.reconnect_grace_secs {
            anyhow::bail!(
                "Reconnect timeout ({}s) must be at least the grace window ({}s)",
                self.reconnect_timeout_secs,
                self.reconnect_grace_secs
            );
        }

        if self.search_timeout_secs == 0 {
            anyhow::bail!("Search timeout must be greater than 0");
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_attempts,
            backoff: Duration::from_millis(self.connect_backoff_ms),
            reconnect_grace: Duration::from_secs(self.reconnect_grace_secs),
            reconnect_timeout: Duration::from_secs(self.reconnect_timeout_secs),
        }
    }

    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            bitrate: self.opus_bitrate,
        }
    }

    /// Resumen para logs; nunca incluye el token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands for {}\n  \
            Audio: {}kbps\n  \
            Voice: {} attempts, {}ms backoff, {}s/{}s reconnect grace/timeout\n  \
            Search: {} ({}), {}s timeout",
            self.guild_id
                .map_or("all guilds".to_string(), |id| format!("guild {}", id)),
            self.opus_bitrate / 1000,
            self.connect_attempts,
            self.connect_backoff_ms,
            self.reconnect_grace_secs,
            self.reconnect_timeout_secs,
            self.ytdlp_path,
            self.ytdlp_format,
            self.search_timeout_secs
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults - obligatorio)
            discord_token: String::new(),
            guild_id: None,

            opus_bitrate: 96_000, // 96kbps (Discord default)

            connect_attempts: 3,
            connect_backoff_ms: 1000,
            reconnect_grace_secs: 5,
            reconnect_timeout_secs: 6,

            ytdlp_path: "yt-dlp".to_string(),
            ytdlp_format: "bestaudio[abr<=96]/bestaudio".to_string(),
            search_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            discord_token: "token".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_bitrate_bounds() {
        let mut config = valid();
        config.opus_bitrate = 600_000;
        assert!(config.validate().is_err());
        config.opus_bitrate = 4_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_shorter_than_grace_rejected() {
        let mut config = valid();
        config.reconnect_grace_secs = 10;
        config.reconnect_timeout_secs = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_matches_defaults() {
        assert_eq!(valid().retry_policy(), RetryPolicy::default());
        assert_eq!(valid().codec_options(), CodecOptions::default());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            guild_id: Some(42),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("guild 42"));
    }
}
