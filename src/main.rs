use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use guild_jukebox::{
    audio::PlaybackCoordinator,
    bot::JukeboxBot,
    config::Config,
    sources::YtDlpSearch,
    voice::{HttpStreamSink, SongbirdGateway},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    // Manager de voz compartido por el cliente y el coordinador
    let songbird = Songbird::serenity();
    let coordinator = PlaybackCoordinator::spawn(
        SongbirdGateway::new(songbird.clone()),
        HttpStreamSink::new()?,
        config.retry_policy(),
        config.codec_options(),
    );
    let search = Arc::new(YtDlpSearch::from_config(&config));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
    let handler = JukeboxBot::new(config.clone(), coordinator, search);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error registering Ctrl+C handler");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        std::process::exit(0);
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
