use anyhow::Result;
use serenity::{
    all::Command,
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        stop_command(),
    ]
}

/// Registra los comandos globalmente (la propagación puede tardar hasta una hora)
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    Command::set_global_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

/// Registra los comandos en una guild (desarrollo, casi instantáneo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Plays audio or adds it to the queue.")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "Search query")
                .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pauses the audio.")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resumes the audio.")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skips the song currently playing.")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stops playback and clears the queue.")
}
