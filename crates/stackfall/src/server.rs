//! `GameServer` builder and the shared server context.
//!
//! The server owns every registry (sessions and rooms) for its lifetime.
//! It does not accept sockets itself: a host reads frames from whatever
//! transport it runs, feeds them to [`GameServer::handle_frame`], writes
//! back the reply, and drains the receiver returned by
//! [`GameServer::connect`] for pushed events.

use std::sync::Arc;
use std::time::Duration;

use stackfall_core::{GameConfig, PieceKind};
use stackfall_protocol::{Codec, CommandReply, Envelope, JsonCodec, PlayerId, ServerEvent};
use stackfall_room::{RoomConfig, RoomInfo, RoomManager};
use stackfall_session::SessionManager;
use tokio::sync::{Mutex, mpsc};

use crate::StackfallError;
use crate::handler;

/// Shared server state passed to every handler.
///
/// Handlers hold one lock at a time and release it before taking the
/// other.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) codec: C,
}

/// Builder for configuring a [`GameServer`].
///
/// # Example
///
/// ```rust,no_run
/// use stackfall::prelude::*;
///
/// let server = GameServer::builder()
///     .max_players(4)
///     .seed(42)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct GameServerBuilder {
    room_config: RoomConfig,
}

impl GameServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets the timings every player runs with.
    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.room_config.game = config;
        self
    }

    pub fn max_players(mut self, max_players: usize) -> Self {
        self.room_config.max_players = max_players;
        self
    }

    /// Seeds piece shuffles so every game is reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.room_config.seed = Some(seed);
        self
    }

    pub fn gravity_interval(mut self, interval: Duration) -> Self {
        self.room_config.game.gravity_interval = interval;
        self
    }

    /// Builds a server speaking JSON.
    pub fn build(self) -> GameServer<JsonCodec> {
        self.build_with_codec(JsonCodec)
    }

    /// Builds a server that frames with `codec`.
    pub fn build_with_codec<C: Codec>(self, codec: C) -> GameServer<C> {
        let rooms = RoomManager::new(self.room_config);
        tracing::info!(
            max_players = rooms.config().max_players,
            seeded = rooms.config().seed.is_some(),
            "stackfall server ready"
        );

        GameServer {
            state: Arc::new(ServerState {
                sessions: Mutex::new(SessionManager::new()),
                rooms: Mutex::new(rooms),
                codec,
            }),
        }
    }
}

/// The top-level server context. Cheap to clone: clones share state.
pub struct GameServer<C: Codec = JsonCodec> {
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Clone for GameServer<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl GameServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> GameServerBuilder {
        GameServerBuilder::new()
    }
}

impl<C: Codec> GameServer<C> {
    /// Registers a new connection.
    ///
    /// Every event pushed to the player arrives on the returned receiver.
    pub async fn connect(&self) -> (PlayerId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let player_id = self.state.sessions.lock().await.connect(tx);
        (player_id, rx)
    }

    /// Validates and runs one command.
    ///
    /// Returns the reply owed to the sender, or `None` when the event is
    /// unknown or the command was rejected. Rejections are reported to the
    /// player as an `error` event instead.
    pub async fn dispatch(&self, player_id: PlayerId, envelope: Envelope) -> Option<CommandReply> {
        handler::dispatch(&self.state, player_id, envelope).await
    }

    /// Decodes a raw frame, dispatches it, and encodes the reply.
    ///
    /// # Errors
    /// Returns [`StackfallError::Protocol`] if the frame is not an
    /// envelope or the reply cannot be encoded.
    pub async fn handle_frame(
        &self,
        player_id: PlayerId,
        frame: &[u8],
    ) -> Result<Option<Vec<u8>>, StackfallError> {
        let envelope: Envelope = self.state.codec.decode(frame)?;
        match self.dispatch(player_id, envelope).await {
            Some(reply) => Ok(Some(self.state.codec.encode(&reply)?)),
            None => Ok(None),
        }
    }

    /// Encodes a pushed event for the wire.
    pub fn encode_event(&self, event: &ServerEvent) -> Result<Vec<u8>, StackfallError> {
        Ok(self.state.codec.encode(event)?)
    }

    /// Removes a player: they leave their room, then their session is
    /// dropped. Unknown players are ignored.
    pub async fn disconnect(&self, player_id: PlayerId) {
        let left = self.state.rooms.lock().await.leave(player_id).await;
        match left {
            Ok(Some(room_id)) => tracing::info!(%player_id, %room_id, "player left room"),
            Ok(None) => {}
            Err(e) => tracing::error!(%player_id, error = %e, "leaving room failed"),
        }

        if let Err(e) = self.state.sessions.lock().await.remove(player_id) {
            tracing::debug!(%player_id, error = %e, "no session to remove");
        }
    }

    /// Snapshot of the room the player is in.
    pub async fn room_info(&self, player_id: PlayerId) -> Result<Option<RoomInfo>, StackfallError> {
        let rooms = self.state.rooms.lock().await;
        match rooms.room_of(player_id) {
            Some(room_id) => Ok(Some(rooms.get_room_info(room_id).await?)),
            None => Ok(None),
        }
    }

    /// Snapshot of a named room.
    pub async fn room_info_by_name(&self, name: &str) -> Result<Option<RoomInfo>, StackfallError> {
        let rooms = self.state.rooms.lock().await;
        match rooms.room_named(name) {
            Some(room_id) => Ok(Some(rooms.get_room_info(room_id).await?)),
            None => Ok(None),
        }
    }

    /// Replaces the piece sequence of the player's room, for replays and
    /// scripted tests. `false` if the player is in no room or `kinds` is
    /// empty.
    pub async fn force_sequence(
        &self,
        player_id: PlayerId,
        kinds: Vec<PieceKind>,
    ) -> Result<bool, StackfallError> {
        let rooms = self.state.rooms.lock().await;
        let Some(room_id) = rooms.room_of(player_id) else {
            return Ok(false);
        };
        Ok(rooms.force_sequence(room_id, kinds).await?)
    }

    /// The name the player uses in their current room.
    pub async fn username(&self, player_id: PlayerId) -> Option<String> {
        self.state
            .sessions
            .lock()
            .await
            .get(player_id)
            .and_then(|session| session.username.clone())
    }

    /// Stops every room actor and drops every session.
    pub async fn shutdown(&self) {
        self.state.rooms.lock().await.shutdown_all().await;
        self.state.sessions.lock().await.clear();
        tracing::info!("stackfall server shut down");
    }

    pub async fn session_count(&self) -> usize {
        self.state.sessions.lock().await.len()
    }

    pub async fn room_count(&self) -> usize {
        self.state.rooms.lock().await.room_count()
    }
}
