//! Capabilities a player uses to reach the room it plays in.
//!
//! A player never holds a pointer to its room. Every simulation entry point
//! takes a [`Ctx`] instead, carrying the current time, whether the room is
//! in game, and a link implementing [`PieceSource`] and [`PenaltyTarget`].

use stackfall_protocol::PlayerId;
use tokio::time::Instant;

use crate::piece::Piece;

/// Where a player's next piece comes from.
pub trait PieceSource {
    /// The next piece for `player`, fresh at its spawn position. `None`
    /// if the player is not part of the current game.
    fn next_piece(&mut self, player: PlayerId) -> Option<Piece>;
}

/// Where a player reports outcomes that affect the rest of the room.
pub trait PenaltyTarget {
    /// `from` cleared rows; everyone else gains `lines` garbage rows.
    fn send_garbage(&mut self, from: PlayerId, lines: usize);

    /// `from` cleared rows with a spin; everyone else falls faster.
    fn send_spin_penalty(&mut self, from: PlayerId, multiplier: u32);

    /// `player`'s column heights changed.
    fn spectrum_changed(&mut self, player: PlayerId);

    /// `player`'s new piece spawned on top of the stack.
    fn player_topped_out(&mut self, player: PlayerId);
}

/// Both capabilities at once.
pub trait GameLink: PieceSource + PenaltyTarget {}

impl<T: PieceSource + PenaltyTarget + ?Sized> GameLink for T {}

/// Per-call context for player simulation.
pub struct Ctx<'a, L: ?Sized> {
    /// Simulation time of this call. Timers are re-armed relative to it.
    pub now: Instant,
    /// Whether the room currently runs a game.
    pub in_game: bool,
    pub link: &'a mut L,
}

impl<'a, L: GameLink + ?Sized> Ctx<'a, L> {
    pub fn new(now: Instant, in_game: bool, link: &'a mut L) -> Self {
        Self { now, in_game, link }
    }
}
