use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{notify::ChannelNotifier, JukeboxBot};
use crate::{
    audio::{Decision, Notifier},
    sources::first_result,
};

/// Maneja los comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Command used outside of a server"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "pause" => {
            let content = if bot.coordinator.pause(guild_id).await {
                "Pausing audio..."
            } else {
                "No audio is playing"
            };
            send_interaction_message(ctx, &command, content, false, false).await;
        }
        "resume" => {
            let content = if bot.coordinator.resume(guild_id).await {
                "Resuming audio..."
            } else {
                "No audio is paused"
            };
            send_interaction_message(ctx, &command, content, false, false).await;
        }
        "skip" => {
            let content = if bot.coordinator.skip(guild_id).await {
                "Skipped the current song"
            } else {
                "No audio is playing"
            };
            send_interaction_message(ctx, &command, content, false, false).await;
        }
        "stop" => {
            let content = if bot.coordinator.stop(guild_id).await {
                "Stopping..."
            } else {
                "There's nothing to stop"
            };
            send_interaction_message(ctx, &command, content, false, false).await;
        }
        _ => {
            send_interaction_message(ctx, &command, "❌ Unknown command", true, false).await;
        }
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) {
    let Some(voice_channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        send_interaction_message(ctx, command, "You must be in a voice channel.", true, false)
            .await;
        return;
    };

    // Buscar y conectar puede superar la ventana de 3s para responder
    if !defer_interaction(ctx, command).await {
        return;
    }

    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .unwrap_or_default();

    match play(ctx, command, bot, guild_id, voice_channel, query).await {
        Ok(reply) => send_interaction_message(ctx, command, reply.content, reply.ephemeral, true).await,
        Err(e) => {
            error!("❌ Error en /play en guild {}: {:?}", guild_id, e);
            send_interaction_message(ctx, command, format!("Error: {}", e), true, true).await;
        }
    }
}

struct Reply {
    content: String,
    ephemeral: bool,
}

async fn play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
    voice_channel: ChannelId,
    query: &str,
) -> Result<Reply> {
    let Some(track) = first_result(bot.search.as_ref(), query).await? else {
        return Ok(Reply {
            content: "No results found.".to_string(),
            ephemeral: true,
        });
    };

    let title = track.title().to_string();
    let notifier: Arc<dyn Notifier> =
        Arc::new(ChannelNotifier::new(ctx.http.clone(), command.channel_id));

    let content = match bot
        .coordinator
        .enqueue_and_maybe_start(guild_id, track, voice_channel, notifier)
        .await?
    {
        Decision::Started => format!("Now playing: **{}**", title),
        Decision::Queued => format!("Added to queue: **{}**", title),
    };

    Ok(Reply {
        content,
        ephemeral: false,
    })
}

/// Canal de voz donde está el usuario, según el cache.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id);
    channel_id
}

/// Difiere la interacción; false si ya expiró.
async fn defer_interaction(ctx: &Context, command: &CommandInteraction) -> bool {
    match command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!("La interacción expiró antes de diferirla: {:?}", e);
            false
        }
    }
}

/// Sends an initial response, or a followup once the interaction is acknowledged.
/// An interaction can only be answered once, so a failed initial response
/// falls back to a followup. Failures are logged, never returned.
async fn send_interaction_message(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
    ephemeral: bool,
    use_followup: bool,
) {
    let content = content.into();

    if !use_followup {
        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(content.clone())
                .ephemeral(ephemeral),
        );
        match command.create_response(&ctx.http, response).await {
            Ok(()) => return,
            Err(e) => warn!("Falló la respuesta inicial, usando followup: {:?}", e),
        }
    }

    let followup = CreateInteractionResponseFollowup::new()
        .content(content)
        .ephemeral(ephemeral);
    if let Err(e) = command.create_followup(&ctx.http, followup).await {
        warn!("No se pudo enviar el followup: {:?}", e);
    }
}
