use std::time::Duration;

use reqwest::Client;
use serenity::model::id::UserId;
use songbird::input::{Input, YoutubeDl};
use tracing::debug;
use url::Url;

use crate::error::PlayerError;

/// Referencia estable a un medio reproducible, con su título para mostrar
#[derive(Debug, Clone)]
pub struct Track {
    title: String,
    url: String,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    requested_by: UserId,
}

impl Track {
    pub fn new(title: String, url: String, requested_by: UserId) -> Self {
        Self {
            title,
            url,
            duration: None,
            thumbnail: None,
            requested_by,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    // Setters
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }
}

/// Resuelve búsquedas y URLs a tracks reproducibles mediante yt-dlp
#[derive(Clone)]
pub struct Resolver {
    client: Client,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Resuelve una búsqueda o URL; de una playlist se toma solo la primera entrada
    pub async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Track, PlayerError> {
        let mut ytdl = if Self::is_direct_url(query) {
            YoutubeDl::new(self.client.clone(), query.to_string())
        } else {
            YoutubeDl::new_search(self.client.clone(), query.to_string())
        };

        let metadata = ytdl
            .search(Some(1))
            .await
            .map_err(|e| {
                debug!("yt-dlp no pudo resolver `{}`: {:?}", query, e);
                PlayerError::Resolution {
                    query: query.to_string(),
                }
            })?
            .into_iter()
            .next()
            .ok_or_else(|| PlayerError::Resolution {
                query: query.to_string(),
            })?;

        let title = metadata
            .track
            .or(metadata.title)
            .unwrap_or_else(|| query.to_string());
        let url = metadata.source_url.unwrap_or_else(|| query.to_string());

        let mut track = Track::new(title, url, requested_by);
        if let Some(duration) = metadata.duration {
            track = track.with_duration(duration);
        }
        if let Some(thumbnail) = metadata.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }

        Ok(track)
    }

    /// Abre el stream de audio de un track ya resuelto
    pub fn open(&self, track: &Track) -> Input {
        YoutubeDl::new(self.client.clone(), track.url().to_string()).into()
    }

    /// Distingue URLs directas de términos de búsqueda
    pub fn is_direct_url(query: &str) -> bool {
        Url::parse(query)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_url_detection() {
        assert!(Resolver::is_direct_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(Resolver::is_direct_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(Resolver::is_direct_url("http://example.com/audio.mp3"));
        assert!(!Resolver::is_direct_url("never gonna give you up"));
        assert!(!Resolver::is_direct_url("ftp://example.com/file"));
        assert!(!Resolver::is_direct_url("despacito"));
    }

    #[test]
    fn track_keeps_resolved_metadata() {
        let track = Track::new(
            "Canción".to_string(),
            "https://example.com/v".to_string(),
            UserId::new(1),
        )
        .with_duration(Duration::from_secs(180))
        .with_thumbnail("https://example.com/t.jpg".to_string());

        assert_eq!(track.title(), "Canción");
        assert_eq!(track.duration(), Some(Duration::from_secs(180)));
        assert_eq!(track.thumbnail(), Some("https://example.com/t.jpg"));
    }
}
