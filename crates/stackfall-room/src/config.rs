//! Room configuration and state machine.

use serde::{Deserialize, Serialize};
use stackfall_core::GameConfig;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room a [`RoomManager`](crate::RoomManager)
/// creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum players allowed in the room.
    pub max_players: usize,

    /// Number of shuffled seven-piece groups in a game's sequence.
    pub piece_groups: usize,

    /// Seed for piece shuffles. `None` seeds from the thread RNG.
    pub seed: Option<u64>,

    /// Capacity of each room actor's command channel.
    pub channel_size: usize,

    /// Timings handed to every player.
    pub game: GameConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 13,
            piece_groups: 15,
            seed: None,
            channel_size: 64,
            game: GameConfig::default(),
        }
    }
}

impl RoomConfig {
    /// Returns a copy with zero-sized settings raised to one.
    pub fn validated(mut self) -> Self {
        if self.max_players == 0 {
            tracing::warn!("max_players of 0 raised to 1");
            self.max_players = 1;
        }
        if self.piece_groups == 0 {
            tracing::warn!("piece_groups of 0 raised to 1");
            self.piece_groups = 1;
        }
        self.channel_size = self.channel_size.max(1);
        self.game = self.game.validated();
        self
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// WaitingForPlayers → InGame ⇄ Finished
/// ```
///
/// - **WaitingForPlayers**: no game has been launched yet.
/// - **InGame**: a game runs. Joins are refused; moves are accepted.
/// - **Finished**: the last game ended. The master may launch again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    WaitingForPlayers,
    InGame,
    Finished,
}

impl RoomState {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(&self) -> bool {
        !self.is_active()
    }

    /// Returns `true` if a game is running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InGame)
    }

    /// The state a successful transition leads to.
    pub fn next(self) -> Self {
        match self {
            Self::WaitingForPlayers | Self::Finished => Self::InGame,
            Self::InGame => Self::Finished,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == target
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitingForPlayers => write!(f, "WaitingForPlayers"),
            Self::InGame => write!(f, "InGame"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}
