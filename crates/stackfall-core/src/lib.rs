//! Simulation core for Stackfall.
//!
//! - [`Piece`] geometry, clockwise rotation, and wall kicks
//! - [`Board`] collision, full-row detection, garbage, spectrum
//! - [`PieceDeck`], the sequence every player in a room draws from
//! - [`Player`], one player's timer-driven simulation
//! - [`PieceSource`] / [`PenaltyTarget`], the capabilities a player uses
//!   to reach its room
//!
//! Everything here is synchronous and owns its state; the room layer
//! decides when time passes.

mod board;
mod config;
mod deck;
mod error;
mod link;
mod piece;
mod player;

pub use board::{Board, COLS, Collision, EMPTY, GARBAGE, ROWS, Row};
pub use config::GameConfig;
pub use deck::PieceDeck;
pub use error::PieceError;
pub use link::{Ctx, GameLink, PenaltyTarget, PieceSource};
pub use piece::{Kick, Piece, PieceKind, RotateOutcome, Shape};
pub use player::{Player, PlayerSender, PlayerView, TimerKind};
