use std::collections::VecDeque;

use crate::sources::Track;

/// Cola de reproducción de una guild.
///
/// Orden de inserción = orden de reproducción, sin reordenamientos y con
/// duplicados permitidos. Vacía es un estado estable: la cola vive mientras
/// viva el proceso.
#[derive(Debug, Default)]
pub struct GuildQueue {
    items: VecDeque<Track>,
}

impl GuildQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Agrega un track al final de la cola
    pub fn push(&mut self, track: Track) {
        self.items.push_back(track);
    }

    /// Retira y devuelve el primer track, si lo hay
    pub fn pop(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Vacía la cola; sin efecto si ya estaba vacía
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Copia ordenada de los tracks pendientes, para mostrar
    pub fn snapshot(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn track(title: &str) -> Track {
        Track::new(
            title.to_string(),
            format!("https://example.com/{title}"),
            UserId::new(1),
        )
    }

    #[test]
    fn pops_in_insertion_order() {
        let mut queue = GuildQueue::new();
        queue.push(track("a"));
        queue.push(track("b"));
        queue.push(track("c"));

        assert_eq!(queue.pop().unwrap().title(), "a");
        assert_eq!(queue.pop().unwrap().title(), "b");
        assert_eq!(queue.pop().unwrap().title(), "c");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn snapshot_preserves_order_without_draining() {
        let mut queue = GuildQueue::new();
        queue.push(track("a"));
        queue.push(track("b"));

        let titles: Vec<_> = queue.snapshot().iter().map(|t| t.title().to_string()).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn duplicates_are_allowed() {
        let mut queue = GuildQueue::new();
        queue.push(track("a"));
        queue.push(track("a"));

        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut queue = GuildQueue::new();
        queue.push(track("a"));

        queue.clear();
        assert!(queue.is_empty());

        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }
}
