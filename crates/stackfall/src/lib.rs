//! # Stackfall
//!
//! Authoritative server core for a multiplayer falling-block game.
//!
//! Players connect to a [`GameServer`], create or join rooms by name, and
//! the room master launches a game. Every player in a room draws from the
//! same piece sequence. Clearing several lines sends garbage rows to
//! opponents, and line clears after a spin slow their gravity down.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stackfall::prelude::*;
//!
//! # async fn run() -> Result<(), StackfallError> {
//! stackfall::init_logging("stackfall=info");
//!
//! let server = GameServer::builder().build();
//! let (player, mut events) = server.connect().await;
//!
//! let frame = br#"{"event":"room:create","data":{"room":"42Paris","username":"alice"}}"#;
//! let reply = server.handle_frame(player, frame).await?;
//! assert_eq!(reply.as_deref(), Some(&b"true"[..]));
//!
//! while let Some(event) = events.recv().await {
//!     let bytes = server.encode_event(&event)?;
//!     // write `bytes` to the player's socket
//! #   let _ = bytes;
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod handler;
mod logging;
mod server;

pub use error::StackfallError;
pub use handler::INTERNAL_ERROR;
pub use logging::init_logging;
pub use server::{GameServer, GameServerBuilder};

/// Convenient re-exports for hosts embedding the server.
pub mod prelude {
    pub use crate::{GameServer, GameServerBuilder, StackfallError};
    pub use stackfall_core::{GameConfig, PieceKind, PlayerView};
    pub use stackfall_protocol::{
        CommandReply, Envelope, ErrorMessage, JoinFailure, Move, PlayerId, RoomId, ServerEvent,
    };
    pub use stackfall_room::{RoomConfig, RoomInfo, RoomState};
}
