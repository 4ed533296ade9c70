use std::{sync::Arc, time::Duration};

use anyhow::Result;
use dashmap::DashMap;
use parking_lot::RwLock;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId, UserId},
};
use songbird::{
    tracks::TrackHandle, Event, EventContext, EventHandler as VoiceEventHandler, Songbird,
    TrackEvent,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    audio::queue::GuildQueue,
    error::PlayerError,
    sources::{Resolver, Track},
    ui::embeds,
};

/// Canal de texto donde se anuncian los cambios de reproducción de una guild
#[derive(Clone)]
pub struct Announce {
    http: Arc<Http>,
    channel: ChannelId,
}

impl Announce {
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        Self { http, channel }
    }

    async fn send_embed(&self, embed: serenity::builder::CreateEmbed) {
        if let Err(e) = self
            .channel
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
        {
            warn!("No se pudo enviar el anuncio: {:?}", e);
        }
    }
}

/// Intento de reproducción en curso para una guild
struct CurrentTrack {
    track: Track,
    handle: Option<TrackHandle>,
}

/// Estado de reproducción de una guild.
///
/// `epoch` identifica el intento vigente: toda transición que lo termina
/// (fin de track, skip, stop, desconexión) lo incrementa, y los callbacks
/// pendientes comparan el valor que capturaron antes de actuar. Un callback
/// con epoch viejo quedó obsoleto y no debe avanzar la cola.
struct PlaybackSession {
    current: Option<CurrentTrack>,
    paused: bool,
    epoch: u64,
    idle_timer: Option<JoinHandle<()>>,
    announce: Option<Announce>,
}

impl PlaybackSession {
    fn new() -> Self {
        Self {
            current: None,
            paused: false,
            epoch: 0,
            idle_timer: None,
            announce: None,
        }
    }

    fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Reclama un nuevo intento de reproducción para `track`
    fn claim(&mut self, track: Track) -> u64 {
        self.epoch += 1;
        self.paused = false;
        self.current = Some(CurrentTrack {
            track,
            handle: None,
        });
        self.epoch
    }

    /// Consume el intento `epoch` si sigue vigente; devuelve su track
    fn finish_if_current(&mut self, epoch: u64) -> Option<Track> {
        if self.epoch != epoch {
            return None;
        }
        let current = self.current.take()?;
        self.epoch += 1;
        self.paused = false;
        Some(current.track)
    }

    /// Retira el intento vigente invalidando sus callbacks pendientes
    fn take_current(&mut self) -> Option<CurrentTrack> {
        let current = self.current.take()?;
        self.epoch += 1;
        self.paused = false;
        Some(current)
    }

    fn arm_idle(&mut self, timer: JoinHandle<()>) {
        self.cancel_idle();
        self.idle_timer = Some(timer);
    }

    fn cancel_idle(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
    }
}

/// Controlador de reproducción: una cola y una sesión de voz por guild.
///
/// Las transiciones de una misma guild se serializan con el mutex de su
/// sesión; guilds distintas nunca compiten entre sí. El lock no se retiene
/// durante resoluciones de red ni durante la espera de inactividad.
#[derive(Clone)]
pub struct PlaybackController {
    queues: Arc<DashMap<GuildId, Arc<RwLock<GuildQueue>>>>,
    sessions: Arc<DashMap<GuildId, Arc<Mutex<PlaybackSession>>>>,
    resolver: Resolver,
    idle_timeout: Duration,
}

impl PlaybackController {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            queues: Arc::new(DashMap::new()),
            sessions: Arc::new(DashMap::new()),
            resolver: Resolver::new(),
            idle_timeout,
        }
    }

    fn queue(&self, guild_id: GuildId) -> Arc<RwLock<GuildQueue>> {
        self.queues
            .entry(guild_id)
            .or_insert_with(|| Arc::new(RwLock::new(GuildQueue::new())))
            .clone()
    }

    fn session(&self, guild_id: GuildId) -> Arc<Mutex<PlaybackSession>> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(PlaybackSession::new())))
            .clone()
    }

    /// Resuelve una búsqueda o URL a un track reproducible
    pub async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Track, PlayerError> {
        self.resolver.resolve(query, requested_by).await
    }

    /// Agrega un track a la cola y abandona cualquier desconexión pendiente
    pub async fn enqueue(&self, guild_id: GuildId, track: Track, announce: Announce) {
        {
            let session = self.session(guild_id);
            let mut s = session.lock().await;
            s.cancel_idle();
            s.announce = Some(announce);
        }

        let pending = {
            let queue = self.queue(guild_id);
            let mut queue = queue.write();
            queue.push(track.clone());
            queue.len()
        };
        info!(
            "➕ Agregado a la cola de {}: {} ({} en espera)",
            guild_id,
            track.title(),
            pending
        );
    }

    /// Abandona una desconexión por inactividad pendiente, si la hay
    pub async fn cancel_idle(&self, guild_id: GuildId) {
        let session = self.session(guild_id);
        session.lock().await.cancel_idle();
    }

    /// Avanza la cola: toma el siguiente track y lo reproduce, o programa la
    /// desconexión por inactividad si no queda nada.
    ///
    /// Es la única transición que consume la cola. Si ya hay un intento de
    /// reproducción vigente no hace nada, así que puede dispararse con
    /// libertad desde enqueue, skip y los callbacks de fin de track.
    pub async fn advance(&self, guild_id: GuildId, manager: Arc<Songbird>) -> Result<()> {
        loop {
            let session = self.session(guild_id);

            // Fase 1: reclamar el siguiente track bajo el lock de la sesión
            let claimed = {
                let mut s = session.lock().await;
                if s.is_busy() {
                    return Ok(());
                }
                s.cancel_idle();
                match self.queue(guild_id).write().pop() {
                    Some(track) => {
                        let epoch = s.claim(track.clone());
                        Some((track, epoch))
                    }
                    None => {
                        let timer = self.spawn_idle_watch(guild_id, manager.clone(), s.epoch());
                        s.arm_idle(timer);
                        debug!(
                            "📭 Cola vacía en {}, desconexión en {:?}",
                            guild_id, self.idle_timeout
                        );
                        None
                    }
                }
            };
            let Some((track, epoch)) = claimed else {
                return Ok(());
            };

            // Fase 2: arrancar el stream en la conexión de voz
            let Some(call) = manager.get(guild_id) else {
                warn!(
                    "Sin conexión de voz en {}, descartando {}",
                    guild_id,
                    track.title()
                );
                let _ = session.lock().await.finish_if_current(epoch);
                return Err(PlayerError::NotConnected.into());
            };

            let input = self.resolver.open(&track);
            let (handle, announce) = {
                let mut s = session.lock().await;
                if s.epoch() != epoch {
                    // Stop o Skip llegaron durante el arranque
                    return Ok(());
                }

                let handle = {
                    let mut call_guard = call.lock().await;
                    call_guard.play_input(input)
                };

                let end_events_ok = handle
                    .add_event(
                        Event::Track(TrackEvent::End),
                        SongEndNotifier {
                            controller: self.clone(),
                            manager: manager.clone(),
                            guild_id,
                            epoch,
                        },
                    )
                    .is_ok()
                    && handle
                        .add_event(
                            Event::Track(TrackEvent::Error),
                            SongEndNotifier {
                                controller: self.clone(),
                                manager: manager.clone(),
                                guild_id,
                                epoch,
                            },
                        )
                        .is_ok();

                if !end_events_ok {
                    warn!("No se pudieron registrar los eventos del track en {}", guild_id);
                    let _ = handle.stop();
                    let _ = s.finish_if_current(epoch);
                    continue;
                }

                if let Some(current) = s.current.as_mut() {
                    current.handle = Some(handle.clone());
                }
                (handle, s.announce.clone())
            };

            // Fase 3: esperar a que el stream sea reproducible, sin locks
            match handle.make_playable_async().await {
                Ok(()) => {
                    info!("🎵 Reproduciendo en {}: {}", guild_id, track.title());
                    if let Some(announce) = announce {
                        announce
                            .send_embed(embeds::create_now_playing_embed(&track))
                            .await;
                    }
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "❌ No se pudo abrir el audio de {}: {:?}",
                        track.title(),
                        e
                    );
                    let _ = handle.stop();
                    if session.lock().await.finish_if_current(epoch).is_none() {
                        // Otro callback ya consumió el intento
                        return Ok(());
                    }
                    if let Some(announce) = &announce {
                        let message = PlayerError::Source {
                            title: track.title().to_string(),
                        }
                        .to_string();
                        announce
                            .send_embed(embeds::create_error_embed(
                                "Error de reproducción",
                                &message,
                            ))
                            .await;
                    }
                    // Un track malo no debe frenar al resto de la cola
                }
            }
        }
    }

    /// Pausa la canción actual; devuelve su título si algo se pausó
    pub async fn pause(&self, guild_id: GuildId) -> Option<String> {
        let session = self.session(guild_id);
        let mut s = session.lock().await;
        if s.paused {
            return None;
        }
        let title = {
            let current = s.current.as_ref()?;
            let handle = current.handle.as_ref()?;
            handle.pause().ok()?;
            current.track.title().to_string()
        };
        s.paused = true;
        info!("⏸️ Pausado en {}: {}", guild_id, title);
        Some(title)
    }

    /// Reanuda la canción pausada; devuelve su título si algo se reanudó
    pub async fn resume(&self, guild_id: GuildId) -> Option<String> {
        let session = self.session(guild_id);
        let mut s = session.lock().await;
        if !s.paused {
            return None;
        }
        let title = {
            let current = s.current.as_ref()?;
            let handle = current.handle.as_ref()?;
            handle.play().ok()?;
            current.track.title().to_string()
        };
        s.paused = false;
        info!("▶️ Reanudado en {}: {}", guild_id, title);
        Some(title)
    }

    /// Salta la canción actual disparando exactamente un avance de la cola
    pub async fn skip(&self, guild_id: GuildId, manager: Arc<Songbird>) -> Option<String> {
        let taken = {
            let session = self.session(guild_id);
            let taken = session.lock().await.take_current();
            taken
        };
        let current = taken?;

        if let Some(handle) = current.handle {
            let _ = handle.stop();
        }
        info!("⏭️ Saltado en {}: {}", guild_id, current.track.title());

        if let Err(e) = self.advance(guild_id, manager).await {
            error!("Error al avanzar la cola en {}: {:?}", guild_id, e);
        }

        Some(current.track.title().to_string())
    }

    /// Detiene todo: limpia la cola, corta el stream y desconecta.
    /// Idempotente, incluso sin conexión de voz.
    pub async fn stop(&self, guild_id: GuildId, manager: Arc<Songbird>) {
        {
            let session = self.session(guild_id);
            let mut s = session.lock().await;
            s.cancel_idle();
            if let Some(current) = s.take_current() {
                if let Some(handle) = current.handle {
                    let _ = handle.stop();
                }
            }
        }

        self.queue(guild_id).write().clear();

        if let Err(e) = manager.remove(guild_id).await {
            debug!("Sin conexión que cerrar en {}: {:?}", guild_id, e);
        }

        info!("⏹️ Reproducción detenida en {}", guild_id);
    }

    /// El bot fue desconectado externamente del canal de voz.
    /// La cola se conserva: la guild puede reconectar y seguir usándola.
    pub async fn handle_disconnect(&self, guild_id: GuildId) {
        let session = self.session(guild_id);
        let mut s = session.lock().await;
        s.cancel_idle();
        if let Some(current) = s.take_current() {
            if let Some(handle) = current.handle {
                let _ = handle.stop();
            }
        }
        info!("🔌 Conexión de voz cerrada en {}", guild_id);
    }

    /// Track que está sonando (o arrancando) ahora mismo
    pub async fn current_track(&self, guild_id: GuildId) -> Option<Track> {
        let session = self.session(guild_id);
        let s = session.lock().await;
        s.current.as_ref().map(|c| c.track.clone())
    }

    /// Tracks pendientes, sin incluir el actual
    pub fn queue_snapshot(&self, guild_id: GuildId) -> Vec<Track> {
        self.queue(guild_id).read().snapshot()
    }

    /// Programa la desconexión por inactividad para `guild_id`.
    ///
    /// La tarea duerme el tiempo de gracia y vuelve a mirar el estado bajo el
    /// lock de la sesión: si mientras tanto llegó un enqueue, un avance o un
    /// epoch nuevo, no hace nada. La desconexión misma ocurre con el lock
    /// tomado, así un enqueue concurrente espera a que termine y reconecta.
    fn spawn_idle_watch(
        &self,
        guild_id: GuildId,
        manager: Arc<Songbird>,
        epoch: u64,
    ) -> JoinHandle<()> {
        let controller = self.clone();
        let timeout = self.idle_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let session = controller.session(guild_id);
            let mut s = session.lock().await;
            if s.epoch() != epoch || s.is_busy() || !controller.queue(guild_id).read().is_empty() {
                // Hubo actividad durante la espera
                return;
            }
            let _ = s.idle_timer.take();

            info!("💤 Inactividad en {}, desconectando", guild_id);
            if let Err(e) = manager.remove(guild_id).await {
                debug!("Sin conexión que cerrar en {}: {:?}", guild_id, e);
            }
        })
    }
}

/// Notificador de fin de track: dispara el avance de la cola.
///
/// Se registra tanto para `TrackEvent::End` como para `TrackEvent::Error`;
/// el epoch capturado colapsa el par en un único avance.
struct SongEndNotifier {
    controller: PlaybackController,
    manager: Arc<Songbird>,
    guild_id: GuildId,
    epoch: u64,
}

#[async_trait::async_trait]
impl VoiceEventHandler for SongEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let finished = {
            let session = self.controller.session(self.guild_id);
            let mut s = session.lock().await;
            s.finish_if_current(self.epoch)
        };

        let Some(track) = finished else {
            // Evento obsoleto: un skip o stop ya cerró este intento
            return None;
        };
        debug!("Track terminado en {}: {}", self.guild_id, track.title());

        if let Err(e) = self
            .controller
            .advance(self.guild_id, self.manager.clone())
            .await
        {
            error!("Error al avanzar la cola en {}: {:?}", self.guild_id, e);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::new(
            title.to_string(),
            format!("https://example.com/{title}"),
            UserId::new(7),
        )
    }

    #[test]
    fn claim_marks_session_busy() {
        let mut session = PlaybackSession::new();
        assert!(!session.is_busy());

        let epoch = session.claim(track("a"));
        assert!(session.is_busy());
        assert_eq!(epoch, session.epoch());
    }

    #[test]
    fn completion_consumes_the_attempt_exactly_once() {
        let mut session = PlaybackSession::new();
        let epoch = session.claim(track("a"));

        assert!(session.finish_if_current(epoch).is_some());
        // Un segundo End/Error para el mismo intento queda obsoleto
        assert!(session.finish_if_current(epoch).is_none());
        assert!(!session.is_busy());
    }

    #[test]
    fn skip_invalidates_the_pending_completion() {
        let mut session = PlaybackSession::new();
        let epoch = session.claim(track("a"));

        let taken = session.take_current();
        assert_eq!(taken.unwrap().track.title(), "a");

        assert!(session.finish_if_current(epoch).is_none());
        assert!(session.take_current().is_none());
    }

    #[test]
    fn stale_epoch_does_not_consume_a_new_attempt() {
        let mut session = PlaybackSession::new();
        let old_epoch = session.claim(track("a"));
        session.take_current();

        let new_epoch = session.claim(track("b"));
        assert!(session.finish_if_current(old_epoch).is_none());
        assert_eq!(
            session.finish_if_current(new_epoch).unwrap().title(),
            "b"
        );
    }

    #[test]
    fn take_current_clears_pause_state() {
        let mut session = PlaybackSession::new();
        session.claim(track("a"));
        session.paused = true;

        session.take_current();
        assert!(!session.paused);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn cancel_idle_aborts_the_pending_teardown() {
        let mut session = PlaybackSession::new();
        let timer = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        session.arm_idle(timer);
        assert!(session.idle_timer.is_some());

        session.cancel_idle();
        assert!(session.idle_timer.is_none());
    }

    #[tokio::test]
    async fn enqueue_preserves_submission_order() {
        let controller = PlaybackController::new(Duration::from_secs(10));
        let guild = GuildId::new(99);
        let announce = Announce::new(Arc::new(Http::new("")), ChannelId::new(1));

        for title in ["a", "b", "c"] {
            controller
                .enqueue(guild, track(title), announce.clone())
                .await;
        }

        let titles: Vec<_> = controller
            .queue_snapshot(guild)
            .iter()
            .map(|t| t.title().to_string())
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn enqueue_cancels_a_pending_idle_teardown() {
        let controller = PlaybackController::new(Duration::from_secs(10));
        let guild = GuildId::new(99);
        let announce = Announce::new(Arc::new(Http::new("")), ChannelId::new(1));

        {
            let session = controller.session(guild);
            let mut s = session.lock().await;
            let timer = tokio::spawn(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
            s.arm_idle(timer);
        }

        controller.enqueue(guild, track("a"), announce).await;

        let session = controller.session(guild);
        assert!(session.lock().await.idle_timer.is_none());
    }
}
