//! Room manager: creates, tracks, and routes players to rooms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use stackfall_core::{PieceKind, PlayerSender};
use stackfall_protocol::{Credentials, Move, PlayerId, RoomId};

use crate::actor::spawn_room;
use crate::room::SOLO_TAG;
use crate::{RoomConfig, RoomError, RoomHandle, RoomInfo};

/// Counter for generating unique room IDs.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

struct RoomEntry {
    handle: RoomHandle,
    /// `None` for anonymous solo rooms, which cannot be joined by name.
    name: Option<String>,
}

/// Manages all active rooms and tracks which player is in which room.
///
/// This is the entry point for room operations from the server context.
pub struct RoomManager {
    rooms: HashMap<RoomId, RoomEntry>,

    /// Named rooms only.
    names: HashMap<String, RoomId>,

    /// Maps each player to the room they're currently in.
    /// A player can be in at most ONE room at a time.
    player_rooms: HashMap<PlayerId, RoomId>,

    config: RoomConfig,
}

impl RoomManager {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            names: HashMap::new(),
            player_rooms: HashMap::new(),
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a room with `player` as its first member and master.
    ///
    /// Without credentials the room is an anonymous solo room where both
    /// the room and the player are called `"[Solo]"`.
    pub async fn create_room(
        &mut self,
        player_id: PlayerId,
        credentials: Option<Credentials>,
        sender: PlayerSender,
    ) -> Result<RoomId, RoomError> {
        if let Some(creds) = &credentials {
            if self.names.contains_key(&creds.room) {
                tracing::warn!(room = %creds.room, "room not created: name taken");
                return Err(RoomError::NameTaken(creds.room.clone()));
            }
        }
        if self.player_rooms.contains_key(&player_id) {
            tracing::warn!(%player_id, "room not created: player already in a room");
            return Err(RoomError::AlreadyInRoom(player_id));
        }

        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let (name, username) = match credentials {
            Some(Credentials { room, username }) => (Some(room), username),
            None => (None, SOLO_TAG.to_string()),
        };
        let handle = spawn_room(
            room_id,
            name.as_deref().unwrap_or(SOLO_TAG),
            self.config.clone(),
        );
        if let Err(e) = handle.join(player_id, username, sender).await {
            let _ = handle.shutdown().await;
            return Err(e);
        }

        if let Some(name) = &name {
            self.names.insert(name.clone(), room_id);
        }
        self.rooms.insert(room_id, RoomEntry { handle, name });
        self.player_rooms.insert(player_id, room_id);
        Ok(room_id)
    }

    /// Adds `player_id` to the room called `room_name`.
    ///
    /// Refusals are checked in order: unknown room, player already in a
    /// room, then the room's own checks (username, in game, capacity).
    pub async fn join_room(
        &mut self,
        player_id: PlayerId,
        room_name: &str,
        username: &str,
        sender: PlayerSender,
    ) -> Result<RoomId, RoomError> {
        let result = self
            .try_join(player_id, room_name, username, sender)
            .await;
        if let Err(e) = &result {
            tracing::warn!(%player_id, room = %room_name, error = %e, "room not joined");
        }
        result
    }

    async fn try_join(
        &mut self,
        player_id: PlayerId,
        room_name: &str,
        username: &str,
        sender: PlayerSender,
    ) -> Result<RoomId, RoomError> {
        let room_id = *self
            .names
            .get(room_name)
            .ok_or_else(|| RoomError::NameNotFound(room_name.to_string()))?;
        if self.player_rooms.contains_key(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id));
        }

        self.handle(room_id)?
            .join(player_id, username, sender)
            .await?;
        self.player_rooms.insert(player_id, room_id);
        Ok(room_id)
    }

    /// Removes a player from their room, destroying the room once empty.
    /// Returns the room they left, or `None` if they were in none.
    pub async fn leave(&mut self, player_id: PlayerId) -> Result<Option<RoomId>, RoomError> {
        let Some(room_id) = self.player_rooms.remove(&player_id) else {
            return Ok(None);
        };

        let remaining = self.handle(room_id)?.leave(player_id).await?;
        if remaining == 0 {
            self.destroy_room(room_id).await?;
        }
        Ok(Some(room_id))
    }

    /// Launches the game in the player's room. `false` if they are in no
    /// room, are not its master, or a game already runs.
    pub async fn launch(&self, player_id: PlayerId) -> Result<bool, RoomError> {
        match self.room_of(player_id) {
            Some(room_id) => self.handle(room_id)?.launch(player_id).await,
            None => Ok(false),
        }
    }

    /// Routes a move to the player's room. Returns whether that room is
    /// in game; `false` if the player is in no room.
    pub async fn make_move(&self, player_id: PlayerId, mv: Move) -> Result<bool, RoomError> {
        match self.room_of(player_id) {
            Some(room_id) => self.handle(room_id)?.make_move(player_id, mv).await,
            None => Ok(false),
        }
    }

    /// `false` if the room refused the sequence.
    pub async fn force_sequence(
        &self,
        room_id: RoomId,
        kinds: Vec<PieceKind>,
    ) -> Result<bool, RoomError> {
        self.handle(room_id)?.force_sequence(kinds).await
    }

    pub async fn get_room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        self.handle(room_id)?.get_info().await
    }

    /// Shuts down a room and removes all its players from the index.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let entry = self
            .rooms
            .remove(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        let _ = entry.handle.shutdown().await;
        if let Some(name) = &entry.name {
            self.names.remove(name);
        }
        self.player_rooms.retain(|_, rid| *rid != room_id);

        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    /// Shuts down every room.
    pub async fn shutdown_all(&mut self) {
        for (room_id, entry) in self.rooms.drain() {
            if entry.handle.shutdown().await.is_err() {
                tracing::debug!(%room_id, "room already stopped");
            }
        }
        self.names.clear();
        self.player_rooms.clear();
    }

    /// Returns the room ID a player is currently in, if any.
    pub fn room_of(&self, player_id: PlayerId) -> Option<RoomId> {
        self.player_rooms.get(&player_id).copied()
    }

    /// Looks up a named room.
    pub fn room_named(&self, name: &str) -> Option<RoomId> {
        self.names.get(name).copied()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn handle(&self, room_id: RoomId) -> Result<&RoomHandle, RoomError> {
        self.rooms
            .get(&room_id)
            .map(|entry| &entry.handle)
            .ok_or(RoomError::NotFound(room_id))
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
