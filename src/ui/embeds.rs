use std::time::Duration;

use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::sources::Track;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Canta";

/// Entradas de la cola que se muestran por mensaje
const QUEUE_PAGE_SIZE: usize = 10;

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("▶️ Reproduciendo Ahora")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_field(track.duration()), true)
        .field(
            "👤 Solicitado por",
            format!("<@{}>", track.requested_by()),
            true,
        )
        .url(track.url())
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

/// Crea un embed para mostrar que se agregó una canción a la cola
pub fn create_track_added_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Agregado a la Cola")
        .description(format!("**{}**", track.title()))
        .color(colors::MUSIC_PURPLE)
        .field("⏱️ Duración", duration_field(track.duration()), true)
        .field(
            "👤 Solicitado por",
            format!("<@{}>", track.requested_by()),
            true,
        )
        .url(track.url())
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

/// Crea un embed con el estado de la cola, numerada desde 1
pub fn create_queue_embed(current: Option<&Track>, pending: &[Track]) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎶 Cola de Reproducción")
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(track) = current {
        embed = embed.field("▶️ Sonando", format!("**{}**", track.title()), false);
    }

    if pending.is_empty() {
        embed = embed.description("🚫 La cola está vacía");
    } else {
        let mut listing: Vec<String> = pending
            .iter()
            .take(QUEUE_PAGE_SIZE)
            .enumerate()
            .map(|(i, track)| format!("{}. **{}**", i + 1, track.title()))
            .collect();

        if pending.len() > QUEUE_PAGE_SIZE {
            listing.push(format!("… y {} más", pending.len() - QUEUE_PAGE_SIZE));
        }

        embed = embed.description(listing.join("\n"));
    }

    embed
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {title}"))
        .description(description)
        .color(colors::ERROR_RED)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea el embed de ayuda con todos los comandos
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎧 Comandos de Canta")
        .color(colors::INFO_BLUE)
        .field(
            "/play <query>",
            "Reproduce un enlace de YouTube o un término de búsqueda",
            false,
        )
        .field("/pause", "Pausa la canción actual", false)
        .field("/resume", "Reanuda la reproducción pausada", false)
        .field("/skip", "Salta a la siguiente canción", false)
        .field("/queue", "Muestra las canciones en cola", false)
        .field("/stop", "Detiene la música y limpia la cola", false)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn duration_field(duration: Option<Duration>) -> String {
    match duration {
        Some(duration) => format_duration(duration),
        None => "🔴 En vivo".to_string(),
    }
}

/// Formatea una duración como m:ss o h:mm:ss
fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
    }

    #[test]
    fn formats_hours_when_needed() {
        assert_eq!(format_duration(Duration::from_secs(3661)), "1:01:01");
    }

    #[test]
    fn live_streams_have_no_duration() {
        assert_eq!(duration_field(None), "🔴 En vivo");
    }
}
