//! Inbound command schemas and their validation rules.
//!
//! Payloads arrive as raw JSON. Each schema reads the fields it knows,
//! checks every rule, and either produces a typed [`Command`] or the full
//! list of problems found. Nothing short-circuits on the first bad field,
//! so a client sees every problem at once.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound event names.
pub mod events {
    pub const CREATE_ROOM: &str = "room:create";
    pub const JOIN_ROOM: &str = "room:join";
    pub const LAUNCH_GAME: &str = "game:launch";
    pub const MAKE_MOVE: &str = "game:move";
}

/// Longest accepted room name or username.
pub const MAX_NAME_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// A player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "right")]
    Right,
    #[serde(rename = "rotation")]
    Rotation,
    #[serde(rename = "soft drop")]
    SoftDrop,
    #[serde(rename = "hard drop")]
    HardDrop,
}

impl Move {
    pub const ALL: [Move; 5] = [
        Move::Left,
        Move::Right,
        Move::Rotation,
        Move::SoftDrop,
        Move::HardDrop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Rotation => "rotation",
            Self::SoftDrop => "soft drop",
            Self::HardDrop => "hard drop",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Move {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|m| m.as_str() == s).ok_or(())
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A room name and username pair that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub room: String,
    pub username: String,
}

/// A validated command, ready for a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `None` asks for an anonymous solo room.
    CreateRoom(Option<Credentials>),
    JoinRoom(Credentials),
    LaunchGame,
    MakeMove(Move),
}

impl Command {
    /// The event name this command arrives under.
    pub fn event(&self) -> &'static str {
        match self {
            Self::CreateRoom(_) => events::CREATE_ROOM,
            Self::JoinRoom(_) => events::JOIN_ROOM,
            Self::LaunchGame => events::LAUNCH_GAME,
            Self::MakeMove(_) => events::MAKE_MOVE,
        }
    }
}

/// Validation outcome: the command, or every message explaining why not.
pub type Validated = Result<Command, Vec<String>>;

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

/// `room:create { room?, username? }`: both or neither.
pub fn parse_create_room(data: &Value) -> Validated {
    let mut errors = Vec::new();
    let room = name_field(data, "room", &mut errors);
    let username = name_field(data, "username", &mut errors);

    let credentials = match (room, username) {
        (Some(room), Some(username)) => Some(Credentials { room, username }),
        _ => {
            if has_field(data, "room") != has_field(data, "username") {
                errors.push(
                    "room and username must either both be defined or both undefined"
                        .to_string(),
                );
            }
            None
        }
    };

    if errors.is_empty() {
        Ok(Command::CreateRoom(credentials))
    } else {
        Err(errors)
    }
}

/// `room:join { room, username }`: both required.
pub fn parse_join_room(data: &Value) -> Validated {
    let mut errors = Vec::new();
    let room = required(name_field(data, "room", &mut errors), data, "room", &mut errors);
    let username = required(
        name_field(data, "username", &mut errors),
        data,
        "username",
        &mut errors,
    );

    match (room, username) {
        (Some(room), Some(username)) if errors.is_empty() => {
            Ok(Command::JoinRoom(Credentials { room, username }))
        }
        _ => Err(errors),
    }
}

/// `game:launch`: the payload is ignored.
pub fn parse_launch_game(_data: &Value) -> Validated {
    Ok(Command::LaunchGame)
}

/// `game:move { move }`.
pub fn parse_make_move(data: &Value) -> Validated {
    match data.get("move") {
        None | Some(Value::Null) => Err(vec!["move is a required field".to_string()]),
        Some(Value::String(s)) => s.parse().map(Command::MakeMove).map_err(|()| {
            let allowed: Vec<&str> = Move::ALL.iter().map(Move::as_str).collect();
            vec![format!(
                "move must be one of the following values: {}",
                allowed.join(", ")
            )]
        }),
        Some(_) => Err(vec!["move must be a `string` type".to_string()]),
    }
}

fn has_field(data: &Value, field: &str) -> bool {
    !matches!(data.get(field), None | Some(Value::Null))
}

/// Reads an optional room-name/username field, recording any rule it breaks.
/// Returns the value only when it is present and valid.
fn name_field(data: &Value, field: &str, errors: &mut Vec<String>) -> Option<String> {
    let value = match data.get(field) {
        None | Some(Value::Null) => return None,
        Some(Value::String(s)) => s,
        Some(_) => {
            errors.push(format!("{field} must be a `string` type"));
            return None;
        }
    };

    let before = errors.len();
    let len = value.chars().count();
    if len < 1 {
        errors.push(format!("{field} must be at least 1 characters"));
    }
    if len > MAX_NAME_LEN {
        errors.push(format!("{field} must be at most {MAX_NAME_LEN} characters"));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(format!("{field} must be alphanumeric"));
    }

    (errors.len() == before).then(|| value.clone())
}

fn required(
    value: Option<String>,
    data: &Value,
    field: &str,
    errors: &mut Vec<String>,
) -> Option<String> {
    if value.is_none() && !has_field(data, field) {
        errors.push(format!("{field} is a required field"));
    }
    value
}
