//! Command routing: the dispatch table and the per-command handlers.
//!
//! Every inbound envelope goes through the same path:
//!   1. Look the event up in [`ROUTES`] (unknown events are ignored)
//!   2. Run the route's schema over the payload
//!   3. Hand the typed [`Command`] to its handler
//!
//! A schema failure or a handler fault never reaches the caller as an
//! error. It becomes an `error` event on the player's own channel and the
//! command gets no reply.

use serde_json::Value;
use stackfall_protocol::commands::{self, Validated, events};
use stackfall_protocol::{
    Codec, Command, CommandReply, Credentials, Envelope, ErrorMessage, ErrorOrigin, PlayerId,
    ProtocolError, ServerEvent,
};
use stackfall_room::{RoomError, SOLO_TAG};

use crate::StackfallError;
use crate::server::ServerState;

/// Message sent in place of the details of an internal fault.
pub const INTERNAL_ERROR: &str = "Internal Server Error";

/// One entry of the dispatch table: an event name and the schema that
/// turns its payload into a [`Command`].
pub(crate) struct Route {
    pub(crate) event: &'static str,
    pub(crate) parse: fn(&Value) -> Validated,
}

pub(crate) const ROUTES: &[Route] = &[
    Route {
        event: events::CREATE_ROOM,
        parse: commands::parse_create_room,
    },
    Route {
        event: events::JOIN_ROOM,
        parse: commands::parse_join_room,
    },
    Route {
        event: events::LAUNCH_GAME,
        parse: commands::parse_launch_game,
    },
    Route {
        event: events::MAKE_MOVE,
        parse: commands::parse_make_move,
    },
];

pub(crate) fn route(event: &str) -> Result<&'static Route, ProtocolError> {
    ROUTES
        .iter()
        .find(|route| route.event == event)
        .ok_or_else(|| ProtocolError::UnknownEvent(event.to_string()))
}

/// Validates and runs one envelope. `None` means no reply is owed.
pub(crate) async fn dispatch<C: Codec>(
    state: &ServerState<C>,
    player_id: PlayerId,
    envelope: Envelope,
) -> Option<CommandReply> {
    let route = match route(&envelope.event) {
        Ok(route) => route,
        Err(e) => {
            tracing::debug!(%player_id, error = %e, "event ignored");
            return None;
        }
    };

    let command = match (route.parse)(&envelope.data) {
        Ok(command) => command,
        Err(messages) => {
            tracing::debug!(
                %player_id,
                event = %envelope.event,
                ?messages,
                "command failed validation"
            );
            report(state, player_id, ErrorMessage::Many(messages), envelope).await;
            return None;
        }
    };

    match execute(state, player_id, command).await {
        Ok(reply) => Some(reply),
        Err(e) => {
            tracing::error!(
                %player_id,
                event = %envelope.event,
                error = %e,
                "command handler failed"
            );
            report(
                state,
                player_id,
                ErrorMessage::Single(INTERNAL_ERROR.to_string()),
                envelope,
            )
            .await;
            None
        }
    }
}

async fn execute<C: Codec>(
    state: &ServerState<C>,
    player_id: PlayerId,
    command: Command,
) -> Result<CommandReply, StackfallError> {
    match command {
        Command::CreateRoom(credentials) => create_room(state, player_id, credentials).await,
        Command::JoinRoom(credentials) => join_room(state, player_id, credentials).await,
        Command::LaunchGame => {
            let launched = state.rooms.lock().await.launch(player_id).await?;
            Ok(CommandReply::Ack(launched))
        }
        Command::MakeMove(mv) => {
            let in_game = state.rooms.lock().await.make_move(player_id, mv).await?;
            Ok(CommandReply::Ack(in_game))
        }
    }
}

async fn create_room<C: Codec>(
    state: &ServerState<C>,
    player_id: PlayerId,
    credentials: Option<Credentials>,
) -> Result<CommandReply, StackfallError> {
    let sender = state.sessions.lock().await.sender(player_id)?;
    let username = credentials
        .as_ref()
        .map_or(SOLO_TAG, |c| c.username.as_str())
        .to_string();

    let created = state
        .rooms
        .lock()
        .await
        .create_room(player_id, credentials, sender)
        .await;
    match created {
        Ok(room_id) => {
            tracing::info!(%player_id, %room_id, %username, "room created");
            state
                .sessions
                .lock()
                .await
                .set_username(player_id, Some(username))?;
            Ok(CommandReply::Ack(true))
        }
        Err(RoomError::NameTaken(_) | RoomError::AlreadyInRoom(_)) => Ok(CommandReply::Ack(false)),
        Err(e) => Err(e.into()),
    }
}

async fn join_room<C: Codec>(
    state: &ServerState<C>,
    player_id: PlayerId,
    Credentials { room, username }: Credentials,
) -> Result<CommandReply, StackfallError> {
    let sender = state.sessions.lock().await.sender(player_id)?;

    let joined = state
        .rooms
        .lock()
        .await
        .join_room(player_id, &room, &username, sender)
        .await;
    match joined {
        Ok(_) => {
            state
                .sessions
                .lock()
                .await
                .set_username(player_id, Some(username))?;
            Ok(CommandReply::joined())
        }
        Err(e) => match e.join_failure() {
            Some(reason) => Ok(CommandReply::refused(reason)),
            None => Err(e.into()),
        },
    }
}

/// Sends an `error` event echoing the offending envelope.
async fn report<C: Codec>(
    state: &ServerState<C>,
    player_id: PlayerId,
    error_msg: ErrorMessage,
    Envelope { event, data }: Envelope,
) {
    let event = ServerEvent::Error {
        error_msg,
        origin: ErrorOrigin { event, data },
    };
    if let Err(e) = state.sessions.lock().await.send(player_id, event) {
        tracing::debug!(%player_id, error = %e, "error event not delivered");
    }
}
