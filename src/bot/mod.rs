//! Implementación del bot de Discord: registro de comandos, despacho de
//! interacciones y seguimiento del estado de voz. La lógica de reproducción
//! vive en [`PlaybackController`]; este módulo es solo el adaptador hacia la
//! plataforma.

use std::sync::Arc;

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::player::PlaybackController, config::Config};

/// Handler principal del bot
pub struct CantaBot {
    /// Configuración cargada desde variables de entorno
    config: Arc<Config>,
    /// Controlador de reproducción y colas por guild
    pub player: PlaybackController,
}

impl CantaBot {
    pub fn new(config: Config) -> Self {
        let player = PlaybackController::new(config.idle_timeout());

        Self {
            config: Arc::new(config),
            player,
        }
    }

    /// Registra los comandos slash según la configuración
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos registrados para la guild {}", guild_id);
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
impl EventHandler for CantaBot {
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

    /// Detecta cuando el bot es expulsado o desconectado manualmente del canal
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;

        if new.user_id == current_user_id && old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                // La cola se conserva; la guild puede reconectar más tarde
                self.player.handle_disconnect(guild_id).await;
            }
        }
    }
}
