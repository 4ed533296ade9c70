use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproducción
    pub idle_timeout_secs: u64, // Segundos sin cola antes de desconectar
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Reproducción
            idle_timeout_secs: std::env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Valida los valores de configuración antes de arrancar el bot
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_secs == 0 {
            anyhow::bail!("IDLE_TIMEOUT_SECS debe ser mayor que 0");
        }

        Ok(())
    }

    /// Tiempo de gracia antes de desconectar una sesión inactiva
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults - deben proveerse)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            // Reproducción
            idle_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        let config = Config {
            idle_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn idle_timeout_defaults_to_ten_seconds() {
        assert_eq!(Config::default().idle_timeout(), Duration::from_secs(10));
    }
}
