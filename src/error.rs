use thiserror::Error;

/// Errores del dominio de reproducción, convertidos a mensajes para el usuario
/// en los handlers de comandos.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Debes estar en un canal de voz")]
    NoVoiceChannel,

    #[error("No se pudo resolver `{query}` a un medio reproducible")]
    Resolution { query: String },

    #[error("No se pudo abrir el audio de **{title}**")]
    Source { title: String },

    #[error("No hay conexión de voz activa")]
    NotConnected,
}
