//! Room lifecycle management for Stackfall.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! players, the shared piece deck, and every player timer.
//!
//! # Key types
//!
//! - [`Room`]: synchronous orchestration (membership, master, fan-out,
//!   end of game)
//! - [`RoomManager`]: creates/destroys rooms, routes players
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomState`]: lifecycle state machine
//! - [`RoomConfig`]: capacity, piece groups, seed, game timings

mod actor;
mod config;
mod error;
mod manager;
mod room;

pub use actor::RoomHandle;
pub use config::{RoomConfig, RoomState};
pub use error::RoomError;
pub use manager::RoomManager;
pub use room::{Room, RoomInfo, SOLO_TAG};
