//! # Bot Module
//!
//! Discord front-end for the jukebox.
//!
//! This module contains:
//! - Slash command registration ([`commands`])
//! - Interaction handling and reply helpers ([`handlers`])
//! - Text-channel notifications for playback events ([`notify`])
//!
//! Everything stateful lives in the playback coordinator; the bot only
//! resolves the caller's voice channel, searches, and forwards requests.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info};

pub mod commands;
pub mod handlers;
pub mod notify;

use crate::{config::Config, sources::SearchProvider, voice::Coordinator};

/// Serenity event handler owning the bot's shared services.
pub struct JukeboxBot {
    config: Arc<Config>,
    /// Colas y conexiones de voz por guild
    pub coordinator: Arc<Coordinator>,
    /// Resuelve las búsquedas de `/play`
    pub search: Arc<dyn SearchProvider>,
}

impl JukeboxBot {
    pub fn new(
        config: Config,
        coordinator: Arc<Coordinator>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            coordinator,
            search,
        }
    }

    /// Registra los comandos slash, por guild si `GUILD_ID` está configurado.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }
}
