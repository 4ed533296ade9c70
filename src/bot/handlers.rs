use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info};

use crate::{audio::player::Announce, bot::CantaBot, error::PlayerError, ui::embeds};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CantaBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot).await?,
        "pause" => handle_pause(ctx, command, bot).await?,
        "resume" => handle_resume(ctx, command, bot).await?,
        "skip" => handle_skip(ctx, command, bot).await?,
        "queue" => handle_queue(ctx, command, bot).await?,
        "stop" => handle_stop(ctx, command, bot).await?,
        "help" => handle_help(ctx, command).await?,
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Comando no reconocido")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(ctx: &Context, command: CommandInteraction, bot: &CantaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // Defer la respuesta ya que la resolución puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // El usuario debe estar en un canal de voz antes de tocar nada
    let Some(voice_channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        let embed =
            embeds::create_error_embed("Sin canal de voz", &PlayerError::NoVoiceChannel.to_string());
        command
            .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
            .await?;
        return Ok(());
    };

    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

    // Abandona cualquier desconexión por inactividad pendiente
    bot.player.cancel_idle(guild_id).await;

    // Conecta al canal del usuario, o se mueve si ya estaba en otro
    if let Err(e) = manager.join(guild_id, voice_channel).await {
        error!("Error al conectar al canal de voz en {}: {:?}", guild_id, e);
        let embed =
            embeds::create_error_embed("Error de conexión", "No se pudo conectar al canal de voz");
        command
            .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
            .await?;
        return Ok(());
    }

    let track = match bot.player.resolve(query, command.user.id).await {
        Ok(track) => track,
        Err(e) => {
            let embed = embeds::create_error_embed("Error de búsqueda", &e.to_string());
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            return Ok(());
        }
    };

    bot.player
        .enqueue(
            guild_id,
            track.clone(),
            Announce::new(ctx.http.clone(), command.channel_id),
        )
        .await;

    let embed = embeds::create_track_added_embed(&track);
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    // Arranca la reproducción si no hay nada sonando
    if let Err(e) = bot.player.advance(guild_id, manager).await {
        error!("Error al iniciar reproducción en {}: {:?}", guild_id, e);
    }

    Ok(())
}

async fn handle_pause(ctx: &Context, command: CommandInteraction, bot: &CantaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let content = match bot.player.pause(guild_id).await {
        Some(title) => format!("⏸️ Pausado: **{title}**"),
        None => "🤷 No hay nada que pausar".to_string(),
    };

    respond_text(ctx, &command, content).await
}

async fn handle_resume(ctx: &Context, command: CommandInteraction, bot: &CantaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let content = match bot.player.resume(guild_id).await {
        Some(title) => format!("▶️ Reanudado: **{title}**"),
        None => "🤷 No hay nada pausado".to_string(),
    };

    respond_text(ctx, &command, content).await
}

async fn handle_skip(ctx: &Context, command: CommandInteraction, bot: &CantaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

    // Defer: saltar implica arrancar el siguiente stream
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let content = match bot.player.skip(guild_id, manager).await {
        Some(title) => format!("⏭️ Saltado: **{title}**"),
        None => "🤷 No hay nada que saltar".to_string(),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

async fn handle_queue(ctx: &Context, command: CommandInteraction, bot: &CantaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let current = bot.player.current_track(guild_id).await;
    let pending = bot.player.queue_snapshot(guild_id);
    let embed = embeds::create_queue_embed(current.as_ref(), &pending);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_stop(ctx: &Context, command: CommandInteraction, bot: &CantaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

    bot.player.stop(guild_id, manager).await;

    respond_text(ctx, &command, "⏹️ Reproducción detenida y cola limpiada").await
}

async fn handle_help(ctx: &Context, command: CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_help_embed())
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

async fn respond_text(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;

    Ok(())
}

/// Canal de voz en el que está un usuario, según la caché
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    ctx.cache.guild(guild_id).and_then(|guild| {
        guild
            .voice_states
            .get(&user_id)
            .and_then(|voice_state| voice_state.channel_id)
    })
}
