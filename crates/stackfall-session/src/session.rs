//! The record of one connected player.

use stackfall_core::PlayerSender;
use stackfall_protocol::{PlayerId, ServerEvent};
use tokio::time::Instant;

/// A single player's connection to the server.
///
/// Lives from `connect` until the connection drops.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,

    /// Where this player's outbound events go. Rooms hold clones of it.
    pub sender: PlayerSender,

    /// The name the player uses in their current room, if they are in one.
    pub username: Option<String>,

    pub connected_at: Instant,
}

impl Session {
    pub fn new(player_id: PlayerId, sender: PlayerSender) -> Self {
        Self {
            player_id,
            sender,
            username: None,
            connected_at: Instant::now(),
        }
    }

    /// Delivers an event straight to this connection. Returns `false` if
    /// the receiving side is gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
