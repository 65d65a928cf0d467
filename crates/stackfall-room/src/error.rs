//! Error types for the room layer.

use stackfall_protocol::{JoinFailure, PlayerId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// No room carries this name.
    #[error("no room named {0:?}")]
    NameNotFound(String),

    /// Another room already uses this name.
    #[error("room name {0:?} is taken")]
    NameTaken(String),

    /// The player already belongs to a room.
    #[error("player {0} is already in a room")]
    AlreadyInRoom(PlayerId),

    /// Someone in the room already plays under this name.
    #[error("username {0:?} is taken in this room")]
    UsernameTaken(String),

    /// The room is running a game and does not accept players.
    #[error("room {0} is in game")]
    InGame(RoomId),

    /// The room is full. No more player slots available.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player is not in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomId),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// The reason reported to a client whose join was refused, or `None`
    /// if this error is not a refusal.
    pub fn join_failure(&self) -> Option<JoinFailure> {
        match self {
            Self::NotFound(_) | Self::NameNotFound(_) => Some(JoinFailure::RoomNotFound),
            Self::AlreadyInRoom(_) => Some(JoinFailure::AlreadyInRoom),
            Self::UsernameTaken(_) => Some(JoinFailure::UsernameTaken),
            Self::InGame(_) => Some(JoinFailure::InGame),
            Self::RoomFull(_) => Some(JoinFailure::RoomFull),
            Self::NameTaken(_) | Self::NotInRoom(..) | Self::Unavailable(_) => None,
        }
    }
}
