//! Core protocol types for Stackfall's wire format.
//!
//! Everything here is serialized as JSON and travels between the server
//! context and a connection. Inbound frames are named events
//! ([`Envelope`]); outbound traffic is a [`ServerEvent`] or a
//! [`CommandReply`] answering the command that triggered it.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected player.
///
/// Newtype over `u64` so it can't be confused with a [`RoomId`].
/// `#[serde(transparent)]` keeps the JSON form a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who inside a room should receive an outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every player in the room.
    All,
    /// One specific player.
    Player(PlayerId),
    /// Everyone except the given player.
    AllExcept(PlayerId),
}

impl Recipient {
    /// Returns `true` if `player` is covered by this recipient.
    pub fn includes(&self, player: PlayerId) -> bool {
        match self {
            Self::All => true,
            Self::Player(target) => *target == player,
            Self::AllExcept(excluded) => *excluded != player,
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound frames
// ---------------------------------------------------------------------------

/// A named inbound message: `{ "event": "game:move", "data": { ... } }`.
///
/// `data` stays untyped until the dispatch table picks a schema for
/// `event`, so a bad payload can be echoed back verbatim in an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// One opponent's column heights, as shown next to a player's own board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectrumEntry {
    pub username: String,
    pub spectrum: Vec<u8>,
}

/// Human-readable error payload: a list of validation messages or a
/// single generic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Many(Vec<String>),
    Single(String),
}

/// The command that caused an error, echoed back to the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorOrigin {
    pub event: String,
    pub data: serde_json::Value,
}

/// Every event the server pushes to a connection.
///
/// Adjacently tagged so the JSON matches the inbound [`Envelope`] shape:
/// `{ "event": "room:players", "data": { "players": ["a", "b"] } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A player's own board changed. `board` is row-major, 20 × 10.
    #[serde(rename = "game:update")]
    GameUpdate {
        board: Vec<u8>,
        #[serde(rename = "gameOver")]
        game_over: bool,
    },

    /// Column heights of every player in the room.
    #[serde(rename = "game:spectrums")]
    Spectrums { spectrums: Vec<SpectrumEntry> },

    /// The room roster changed.
    #[serde(rename = "room:players")]
    Players { players: Vec<String> },

    /// The room master changed (or was announced to a newcomer).
    #[serde(rename = "room:master")]
    Master {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// The game is over. Solo games carry no winner.
    #[serde(rename = "game:end")]
    GameEnd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner: Option<String>,
    },

    /// A command was rejected or failed internally.
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "errorMsg")]
        error_msg: ErrorMessage,
        origin: ErrorOrigin,
    },
}

impl ServerEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GameUpdate { .. } => "game:update",
            Self::Spectrums { .. } => "game:spectrums",
            Self::Players { .. } => "room:players",
            Self::Master { .. } => "room:master",
            Self::GameEnd { .. } => "game:end",
            Self::Error { .. } => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Why a `room:join` was refused.
///
/// Serialized as the exact reason strings clients display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinFailure {
    #[serde(rename = "Room Not Found")]
    RoomNotFound,
    #[serde(rename = "Already in a Room")]
    AlreadyInRoom,
    #[serde(rename = "Username Taken")]
    UsernameTaken,
    #[serde(rename = "In Game")]
    InGame,
    #[serde(rename = "Room Full")]
    RoomFull,
}

impl fmt::Display for JoinFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::RoomNotFound => "Room Not Found",
            Self::AlreadyInRoom => "Already in a Room",
            Self::UsernameTaken => "Username Taken",
            Self::InGame => "In Game",
            Self::RoomFull => "Room Full",
        };
        f.write_str(reason)
    }
}

/// The acknowledgement returned to the sender of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandReply {
    /// `room:create`, `game:launch`, `game:move`.
    Ack(bool),
    /// `room:join`.
    Join {
        joined: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<JoinFailure>,
    },
}

impl CommandReply {
    pub fn joined() -> Self {
        Self::Join {
            joined: true,
            reason: None,
        }
    }

    pub fn refused(reason: JoinFailure) -> Self {
        Self::Join {
            joined: false,
            reason: Some(reason),
        }
    }

    /// Whether the command took effect.
    pub fn is_success(&self) -> bool {
        match self {
            Self::Ack(ok) => *ok,
            Self::Join { joined, .. } => *joined,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ids_display_with_prefix() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
        assert_eq!(RoomId(3).to_string(), "R-3");
    }

    #[test]
    fn test_recipient_includes() {
        let a = PlayerId(1);
        let b = PlayerId(2);
        assert!(Recipient::All.includes(a));
        assert!(Recipient::Player(a).includes(a));
        assert!(!Recipient::Player(a).includes(b));
        assert!(!Recipient::AllExcept(a).includes(a));
        assert!(Recipient::AllExcept(a).includes(b));
    }

    #[test]
    fn test_envelope_data_defaults_to_null() {
        let env: Envelope =
            serde_json::from_value(json!({ "event": "game:launch" })).unwrap();
        assert_eq!(env.event, "game:launch");
        assert!(env.data.is_null());
    }

    #[test]
    fn test_game_update_shape() {
        let event = ServerEvent::GameUpdate {
            board: vec![0, 8],
            game_over: true,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "event": "game:update", "data": { "board": [0, 8], "gameOver": true } })
        );
    }

    #[test]
    fn test_master_without_username_is_empty_object() {
        let event = ServerEvent::Master { username: None };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "event": "room:master", "data": {} })
        );
    }

    #[test]
    fn test_game_end_solo_and_winner() {
        let solo = ServerEvent::GameEnd { winner: None };
        let multi = ServerEvent::GameEnd {
            winner: Some("alice".into()),
        };
        assert_eq!(serde_json::to_value(&solo).unwrap()["data"], json!({}));
        assert_eq!(
            serde_json::to_value(&multi).unwrap()["data"],
            json!({ "winner": "alice" })
        );
    }

    #[test]
    fn test_error_event_shape() {
        let event = ServerEvent::Error {
            error_msg: ErrorMessage::Single("Internal Server Error".into()),
            origin: ErrorOrigin {
                event: "room:join".into(),
                data: json!({ "room": "42Paris" }),
            },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "error",
                "data": {
                    "errorMsg": "Internal Server Error",
                    "origin": { "event": "room:join", "data": { "room": "42Paris" } }
                }
            })
        );
        assert_eq!(event.name(), "error");
    }

    #[test]
    fn test_join_reply_shapes() {
        assert_eq!(
            serde_json::to_value(CommandReply::joined()).unwrap(),
            json!({ "joined": true })
        );
        assert_eq!(
            serde_json::to_value(CommandReply::refused(JoinFailure::RoomFull)).unwrap(),
            json!({ "joined": false, "reason": "Room Full" })
        );
        assert_eq!(serde_json::to_value(CommandReply::Ack(false)).unwrap(), json!(false));
    }

    #[test]
    fn test_join_failure_display_matches_wire() {
        for reason in [
            JoinFailure::RoomNotFound,
            JoinFailure::AlreadyInRoom,
            JoinFailure::UsernameTaken,
            JoinFailure::InGame,
            JoinFailure::RoomFull,
        ] {
            assert_eq!(
                serde_json::to_value(reason).unwrap(),
                json!(reason.to_string())
            );
        }
    }
}
