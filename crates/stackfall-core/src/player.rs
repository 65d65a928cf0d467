//! One player's simulation: board, current piece, gravity, line clears,
//! incoming penalties.
//!
//! A player moves through four phases:
//!
//! ```text
//! pre-game ──init_game──▶ falling ◀──────────────┐
//!                           │ lock with full rows │
//!                           ▼                     │
//!                        clearing ──collapse──────┘
//!                           │
//!      spawn on the stack ──▶ dead
//! ```
//!
//! Nothing here sleeps. Each delay is an owned [`Timer`] slot; the room
//! asks for [`Player::next_deadline`] and calls [`Player::fire_due`] when
//! the time comes. All effects on other players go out through the
//! [`Ctx`] link.

use std::time::Duration;

use stackfall_protocol::{Move, PlayerId, ServerEvent};
use stackfall_timer::{Timer, earliest};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::board::{Board, COLS, Collision, EMPTY, ROWS};
use crate::config::GameConfig;
use crate::link::{Ctx, GameLink};
use crate::piece::{Piece, PieceKind};

/// Channel sender for delivering events to a player's connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Diagonal corners of a T piece's 3 × 3 box, as (dx, dy).
const T_CORNERS: [(i32, i32); 4] = [(0, 0), (2, 0), (0, 2), (2, 2)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClearStage {
    Blank,
    Collapse,
}

#[derive(Debug, Clone)]
struct PendingClear {
    rows: Vec<usize>,
    stage: ClearStage,
}

/// The timer slots a player owns. Order breaks ties between timers due
/// at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerKind {
    Clear,
    Spawn,
    Gravity,
    PenaltyExpiry,
}

impl TimerKind {
    const ALL: [TimerKind; 4] = [
        TimerKind::Clear,
        TimerKind::Spawn,
        TimerKind::Gravity,
        TimerKind::PenaltyExpiry,
    ];
}

/// A read-only snapshot of a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub alive: bool,
    pub board: Board,
    pub spectrum: Vec<u8>,
    pub piece: Option<Piece>,
    pub spin_penalty: u32,
}

pub struct Player {
    id: PlayerId,
    name: String,
    sender: PlayerSender,
    config: GameConfig,

    board: Board,
    spectrum: Vec<u8>,
    piece: Option<Piece>,
    alive: bool,
    is_spin: bool,
    spin_penalty: u32,
    /// Set while completed rows are being animated away. Input is ignored
    /// until it clears.
    clearing: Option<PendingClear>,

    spawn: Timer,
    gravity: Timer,
    clear: Timer,
    penalty_expiry: Timer,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: impl Into<String>,
        sender: PlayerSender,
        config: GameConfig,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            sender,
            config: config.validated(),
            board: Board::new(),
            spectrum: vec![0; COLS],
            piece: None,
            alive: false,
            is_spin: false,
            spin_penalty: 0,
            clearing: None,
            spawn: Timer::idle(),
            gravity: Timer::idle(),
            clear: Timer::idle(),
            penalty_expiry: Timer::idle(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Direct board access, for seeding positions.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn spectrum(&self) -> &[u8] {
        &self.spectrum
    }

    pub fn piece(&self) -> Option<&Piece> {
        self.piece.as_ref()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_spin(&self) -> bool {
        self.is_spin
    }

    pub fn spin_penalty(&self) -> u32 {
        self.spin_penalty
    }

    pub fn is_clearing(&self) -> bool {
        self.clearing.is_some()
    }

    /// Period of the armed gravity timer, if any.
    pub fn gravity_period(&self) -> Option<Duration> {
        self.gravity.period()
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            alive: self.alive,
            board: self.board.clone(),
            spectrum: self.spectrum.clone(),
            piece: self.piece.clone(),
            spin_penalty: self.spin_penalty,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Resets everything for a new game and schedules the first piece.
    pub fn init_game<L: GameLink + ?Sized>(&mut self, ctx: &mut Ctx<'_, L>) {
        self.cancel_timers();
        self.board = Board::new();
        self.spectrum = vec![0; COLS];
        self.piece = None;
        self.alive = true;
        self.is_spin = false;
        self.spin_penalty = 0;
        self.clearing = None;

        self.send_update();
        self.update_spectrum(ctx);
        self.spawn.arm_once(ctx.now + self.config.spawn_delay);
    }

    /// Stops all simulation for a player leaving the room.
    pub fn teardown(&mut self) {
        self.cancel_timers();
        self.alive = false;
        self.clearing = None;
        debug!(player_id = %self.id, "player simulation stopped");
    }

    fn cancel_timers(&mut self) {
        self.spawn.cancel();
        self.gravity.cancel();
        self.clear.cancel();
        self.penalty_expiry.cancel();
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    fn timer(&self, kind: TimerKind) -> &Timer {
        match kind {
            TimerKind::Clear => &self.clear,
            TimerKind::Spawn => &self.spawn,
            TimerKind::Gravity => &self.gravity,
            TimerKind::PenaltyExpiry => &self.penalty_expiry,
        }
    }

    fn timer_mut(&mut self, kind: TimerKind) -> &mut Timer {
        match kind {
            TimerKind::Clear => &mut self.clear,
            TimerKind::Spawn => &mut self.spawn,
            TimerKind::Gravity => &mut self.gravity,
            TimerKind::PenaltyExpiry => &mut self.penalty_expiry,
        }
    }

    /// The earliest pending deadline across this player's timers.
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(TimerKind::ALL.map(|kind| self.timer(kind).deadline()))
    }

    /// Fires the earliest timer due at `ctx.now`. Returns `false` if none was.
    pub fn fire_due<L: GameLink + ?Sized>(&mut self, ctx: &mut Ctx<'_, L>) -> bool {
        let due = TimerKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.timer(kind)
                    .deadline()
                    .filter(|deadline| *deadline <= ctx.now)
                    .map(|deadline| (deadline, kind))
            })
            .min();
        let Some((_, kind)) = due else {
            return false;
        };
        if !self.timer_mut(kind).fire_if_due(ctx.now) {
            return false;
        }

        match kind {
            TimerKind::Spawn => {
                if ctx.in_game {
                    self.request_piece_and_make_it_fall(ctx);
                }
            }
            TimerKind::Gravity => self.gravity_tick(ctx),
            TimerKind::Clear => self.advance_clear(ctx),
            TimerKind::PenaltyExpiry => {
                self.spin_penalty = 0;
                debug!(player_id = %self.id, "speed penalty expired");
                if ctx.in_game {
                    self.relaunch_gravity(ctx.now);
                }
            }
        }
        true
    }

    fn relaunch_gravity(&mut self, now: Instant) {
        if self.alive && self.piece.is_some() {
            self.gravity
                .arm_every(now, self.config.gravity_with_penalty(self.spin_penalty));
        }
    }

    // -----------------------------------------------------------------------
    // Pieces
    // -----------------------------------------------------------------------

    /// Resolves any completed rows first; otherwise spawns the next piece.
    fn request_piece_and_make_it_fall<L: GameLink + ?Sized>(&mut self, ctx: &mut Ctx<'_, L>) {
        if !self.alive {
            return;
        }

        let rows = self.board.full_rows();
        if !rows.is_empty() {
            debug!(player_id = %self.id, rows = rows.len(), "rows completed");
            self.clearing = Some(PendingClear {
                rows,
                stage: ClearStage::Blank,
            });
            self.clear.arm_once(ctx.now + self.config.clear_blank_delay);
            return;
        }

        self.spawn_piece(ctx);
    }

    fn spawn_piece<L: GameLink + ?Sized>(&mut self, ctx: &mut Ctx<'_, L>) {
        let Some(mut piece) = ctx.link.next_piece(self.id) else {
            warn!(player_id = %self.id, "no piece available for player");
            return;
        };
        self.is_spin = false;

        if self.board.collision(&piece) == Collision::Block {
            self.alive = false;
            self.gravity.cancel();
            info!(player_id = %self.id, name = %self.name, "player topped out");

            while self.board.collision(&piece) == Collision::Block {
                piece.y -= 1;
            }
            self.board.draw(&piece);
            self.piece = Some(piece);
            self.send_update();
            self.update_spectrum(ctx);
            ctx.link.player_topped_out(self.id);
            return;
        }

        self.board.draw(&piece);
        self.piece = Some(piece);
        self.send_update();
        self.gravity
            .arm_every(ctx.now, self.config.gravity_with_penalty(self.spin_penalty));
    }

    fn gravity_tick<L: GameLink + ?Sized>(&mut self, ctx: &mut Ctx<'_, L>) {
        if !self.alive || !ctx.in_game {
            self.gravity.cancel();
            return;
        }
        let Some(piece) = self.piece.as_mut() else {
            self.gravity.cancel();
            return;
        };

        self.board.erase(piece);
        piece.y += 1;
        if self.board.collides(piece) {
            piece.y -= 1;
            self.lock(ctx);
            return;
        }

        self.is_spin = false;
        self.board.draw(piece);
        self.send_update();
    }

    /// Fixes the current piece in place and moves on to the next one.
    fn lock<L: GameLink + ?Sized>(&mut self, ctx: &mut Ctx<'_, L>) {
        self.gravity.cancel();
        if let Some(piece) = self.piece.take() {
            self.board.draw(&piece);
        }
        self.send_update();
        self.update_spectrum(ctx);
        self.request_piece_and_make_it_fall(ctx);
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Applies one input. Ignored while dead, while clearing rows, outside
    /// a game, or with no piece in play.
    pub fn make_move<L: GameLink + ?Sized>(&mut self, mv: Move, ctx: &mut Ctx<'_, L>) {
        if !self.alive || self.clearing.is_some() || !ctx.in_game {
            return;
        }
        let Some(mut piece) = self.piece.take() else {
            return;
        };

        self.board.erase(&piece);
        let before = (piece.x, piece.y);

        match mv {
            Move::Left => self.shift(&mut piece, -1),
            Move::Right => self.shift(&mut piece, 1),
            Move::Rotation => {
                let board = &self.board;
                self.is_spin = piece.rotate(|p| board.collides(p)).is_spin();
                if !self.is_spin && piece.kind() == PieceKind::T {
                    self.check_t_spin(&piece);
                }
            }
            Move::SoftDrop => {
                piece.y += 1;
                if self.board.collides(&piece) {
                    piece.y -= 1;
                    self.gravity
                        .arm_every(ctx.now, self.config.gravity_with_penalty(self.spin_penalty));
                }
            }
            Move::HardDrop => {
                while !self.board.collides(&piece) {
                    piece.y += 1;
                }
                piece.y -= 1;
            }
        }

        if mv != Move::Rotation && (piece.x, piece.y) != before {
            self.is_spin = false;
        }

        if mv == Move::HardDrop {
            self.piece = Some(piece);
            self.lock(ctx);
            return;
        }

        self.board.draw(&piece);
        self.piece = Some(piece);
        self.send_update();
    }

    fn shift(&self, piece: &mut Piece, dx: i32) {
        piece.x += dx;
        if self.board.collides(piece) {
            piece.x -= dx;
        }
    }

    /// Three-corner rule: a T with at least three of its box corners
    /// occupied (or off the board) counts as a spin.
    fn check_t_spin(&mut self, piece: &Piece) {
        let occupied = T_CORNERS
            .iter()
            .filter(|(dx, dy)| self.board.cell(piece.x + dx, piece.y + dy) != Some(EMPTY))
            .count();
        if occupied >= 3 {
            self.is_spin = true;
        }
    }

    // -----------------------------------------------------------------------
    // Line clears
    // -----------------------------------------------------------------------

    fn advance_clear<L: GameLink + ?Sized>(&mut self, ctx: &mut Ctx<'_, L>) {
        let Some(stage) = self.clearing.as_ref().map(|c| c.stage) else {
            return;
        };

        match stage {
            ClearStage::Blank => {
                if let Some(pending) = self.clearing.as_mut() {
                    self.board.blank_rows(&pending.rows);
                    pending.stage = ClearStage::Collapse;
                }
                self.send_update();
                self.clear
                    .arm_once(ctx.now + self.config.clear_collapse_delay);
            }
            ClearStage::Collapse => {
                let Some(pending) = self.clearing.take() else {
                    return;
                };
                self.board.remove_rows(&pending.rows);
                self.send_update();
                self.update_spectrum(ctx);

                let cleared = pending.rows.len();
                info!(
                    player_id = %self.id,
                    cleared,
                    spin = self.is_spin,
                    "rows cleared"
                );
                if !ctx.in_game {
                    return;
                }
                if cleared > 1 {
                    ctx.link.send_garbage(self.id, cleared - 1);
                }
                if self.is_spin && cleared > 0 {
                    ctx.link.send_spin_penalty(self.id, cleared as u32);
                }
                self.spawn_piece(ctx);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Penalties
    // -----------------------------------------------------------------------

    /// Pushes `lines` garbage rows in from the bottom. After each row the
    /// current piece moves up one row if it now overlaps the stack.
    pub fn add_penalty_lines<L: GameLink + ?Sized>(&mut self, lines: usize, ctx: &mut Ctx<'_, L>) {
        if lines == 0 {
            return;
        }
        let lines = lines.min(ROWS);

        if let Some(piece) = &self.piece {
            self.board.erase(piece);
        }
        for _ in 0..lines {
            self.board.push_garbage_row();
            if let Some(piece) = self.piece.as_mut() {
                if self.board.collision(piece) == Collision::Block {
                    piece.y -= 1;
                }
            }
        }
        // Rows waiting to clear moved up with the stack.
        if let Some(pending) = self.clearing.as_mut() {
            pending.rows = pending
                .rows
                .iter()
                .filter_map(|row| row.checked_sub(lines))
                .collect();
        }
        debug!(player_id = %self.id, lines, "garbage received");

        self.update_spectrum(ctx);
        if let Some(piece) = &self.piece {
            self.board.draw(piece);
        }
        self.send_update();
    }

    /// Speeds gravity up to `base / (1 + multiplier)` for the penalty
    /// window. A new penalty replaces the old one and restarts the window.
    pub fn apply_spin_penalty(&mut self, multiplier: u32, now: Instant) {
        self.spin_penalty = multiplier;
        self.relaunch_gravity(now);
        self.penalty_expiry
            .arm_once(now + self.config.spin_penalty_window);
        debug!(player_id = %self.id, multiplier, "speed penalty applied");
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    fn update_spectrum<L: GameLink + ?Sized>(&mut self, ctx: &mut Ctx<'_, L>) {
        self.spectrum = self.board.spectrum();
        ctx.link.spectrum_changed(self.id);
    }

    fn send_update(&self) {
        // A closed channel means the connection is gone; the room will
        // remove the player when the disconnect arrives.
        let _ = self.sender.send(ServerEvent::GameUpdate {
            board: self.board.flatten(),
            game_over: !self.alive,
        });
    }
}
