//! The session manager: tracks every connected player.
//!
//! # Concurrency note
//!
//! `SessionManager` is not thread-safe by itself. It uses a plain
//! `HashMap`; the server context keeps it behind a mutex.

use std::collections::HashMap;

use stackfall_core::PlayerSender;
use stackfall_protocol::{PlayerId, ServerEvent};

use crate::{Session, SessionError};

/// Registry of connected players, keyed by the id handed out on connect.
///
/// ```text
/// connect() ──→ set_username() ──→ remove()
///     │               ▲  │
///     │               └──┘ (join / leave rooms)
///     ▼
///  PlayerId
/// ```
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,
    next_id: u64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a new connection under a fresh id.
    pub fn connect(&mut self, sender: PlayerSender) -> PlayerId {
        let player_id = PlayerId(self.next_id);
        self.next_id += 1;
        self.sessions
            .insert(player_id, Session::new(player_id, sender));
        tracing::info!(%player_id, "session created");
        player_id
    }

    /// Drops a player's session.
    pub fn remove(&mut self, player_id: PlayerId) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        tracing::info!(%player_id, "session removed");
        Ok(session)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Session> {
        self.sessions.get(&player_id)
    }

    /// A clone of the player's outbound channel.
    pub fn sender(&self, player_id: PlayerId) -> Result<PlayerSender, SessionError> {
        self.sessions
            .get(&player_id)
            .map(|s| s.sender.clone())
            .ok_or(SessionError::NotFound(player_id))
    }

    /// Records (or clears) the name the player uses in their room.
    pub fn set_username(
        &mut self,
        player_id: PlayerId,
        username: Option<String>,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        session.username = username;
        Ok(())
    }

    /// Sends an event directly to one player, outside any room.
    pub fn send(&self, player_id: PlayerId, event: ServerEvent) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        if !session.send(event) {
            tracing::debug!(%player_id, "receiver dropped, event discarded");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops every session.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn channel() -> (PlayerSender, mpsc::UnboundedReceiver<ServerEvent>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_connect_allocates_sequential_ids() {
        let mut manager = SessionManager::new();
        let (tx, _rx) = channel();
        let a = manager.connect(tx.clone());
        let b = manager.connect(tx);
        assert_eq!(a, PlayerId(1));
        assert_eq!(b, PlayerId(2));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_ids_are_not_reused_after_remove() {
        let mut manager = SessionManager::new();
        let (tx, _rx) = channel();
        let first = manager.connect(tx.clone());
        manager.remove(first).unwrap();
        assert_ne!(manager.connect(tx), first);
    }

    #[test]
    fn test_remove_unknown_player() {
        let mut manager = SessionManager::new();
        assert_eq!(
            manager.remove(PlayerId(9)).unwrap_err(),
            SessionError::NotFound(PlayerId(9))
        );
    }

    #[test]
    fn test_username_tracks_room_membership() {
        let mut manager = SessionManager::new();
        let (tx, _rx) = channel();
        let id = manager.connect(tx);
        assert_eq!(manager.get(id).unwrap().username, None);

        manager.set_username(id, Some("alice".into())).unwrap();
        assert_eq!(manager.get(id).unwrap().username.as_deref(), Some("alice"));

        manager.set_username(id, None).unwrap();
        assert_eq!(manager.get(id).unwrap().username, None);
    }

    #[test]
    fn test_send_reaches_receiver() {
        let mut manager = SessionManager::new();
        let (tx, mut rx) = channel();
        let id = manager.connect(tx);
        let event = ServerEvent::GameEnd { winner: None };
        manager.send(id, event.clone()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), event);
    }

    #[test]
    fn test_send_to_dropped_receiver_is_not_an_error() {
        let mut manager = SessionManager::new();
        let (tx, rx) = channel();
        let id = manager.connect(tx);
        drop(rx);
        assert!(manager.get(id).unwrap().is_closed());
        assert!(manager.send(id, ServerEvent::GameEnd { winner: None }).is_ok());
    }

    #[test]
    fn test_sender_of_removed_player() {
        let mut manager = SessionManager::new();
        let (tx, _rx) = channel();
        let id = manager.connect(tx);
        manager.remove(id).unwrap();
        assert!(manager.sender(id).is_err());
        assert!(manager.is_empty());
    }
}
