//! Room orchestration: membership, the shared piece deck, penalty fan-out,
//! master election, end-of-game arbitration.
//!
//! [`Room`] is synchronous and owns every player in it. The room actor
//! decides when time passes; each method here takes the current
//! [`Instant`] explicitly.
//!
//! Players reach the room only through a short-lived link handed to them
//! for the duration of one call. Whatever they report (garbage, speed
//! penalties, spectrum changes, top-outs) is queued on the room and fanned
//! out once the call returns, so no player is ever borrowed twice.

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stackfall_core::{
    Ctx, PenaltyTarget, Piece, PieceDeck, PieceKind, PieceSource, Player, PlayerSender, PlayerView,
};
use stackfall_protocol::{Move, PlayerId, Recipient, RoomId, ServerEvent, SpectrumEntry};
use stackfall_timer::earliest;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{RoomConfig, RoomError, RoomState};

/// Room name and player name of an anonymous solo game.
pub const SOLO_TAG: &str = "[Solo]";

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum RoomEffect {
    Garbage { from: PlayerId, lines: usize },
    SpinPenalty { from: PlayerId, multiplier: u32 },
    SpectrumChanged,
    ToppedOut(PlayerId),
}

struct Link<'a> {
    deck: &'a mut PieceDeck,
    effects: &'a mut VecDeque<RoomEffect>,
}

impl PieceSource for Link<'_> {
    fn next_piece(&mut self, player: PlayerId) -> Option<Piece> {
        self.deck.draw(player)
    }
}

impl PenaltyTarget for Link<'_> {
    fn send_garbage(&mut self, from: PlayerId, lines: usize) {
        self.effects.push_back(RoomEffect::Garbage { from, lines });
    }

    fn send_spin_penalty(&mut self, from: PlayerId, multiplier: u32) {
        self.effects
            .push_back(RoomEffect::SpinPenalty { from, multiplier });
    }

    fn spectrum_changed(&mut self, _player: PlayerId) {
        self.effects.push_back(RoomEffect::SpectrumChanged);
    }

    fn player_topped_out(&mut self, player: PlayerId) {
        self.effects.push_back(RoomEffect::ToppedOut(player));
    }
}

// ---------------------------------------------------------------------------
// RoomInfo
// ---------------------------------------------------------------------------

/// A snapshot of a room and everyone in it.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub name: String,
    pub state: RoomState,
    /// Whether the current (or last) game was a solo game.
    pub solo: bool,
    /// The master's username.
    pub master: Option<String>,
    /// Players in join order.
    pub players: Vec<PlayerView>,
    pub max_players: usize,
}

impl RoomInfo {
    pub fn in_game(&self) -> bool {
        self.state.is_active()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// The view of the player called `name`.
    pub fn player(&self, name: &str) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.name == name)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

pub struct Room {
    id: RoomId,
    name: String,
    config: RoomConfig,
    state: RoomState,
    solo: bool,
    /// Join order. The first player inherits the master role.
    players: Vec<Player>,
    senders: HashMap<PlayerId, PlayerSender>,
    master: Option<PlayerId>,
    deck: PieceDeck,
    forced: Option<Vec<PieceKind>>,
    effects: VecDeque<RoomEffect>,
    rng: StdRng,
}

impl Room {
    pub fn new(id: RoomId, name: impl Into<String>, config: RoomConfig) -> Self {
        let config = config.validated();
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let name = name.into();
        info!(room_id = %id, %name, "room created");
        Self {
            id,
            name,
            config,
            state: RoomState::WaitingForPlayers,
            solo: false,
            players: Vec::new(),
            senders: HashMap::new(),
            master: None,
            deck: PieceDeck::default(),
            forced: None,
            effects: VecDeque::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn is_in_game(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_solo(&self) -> bool {
        self.solo
    }

    pub fn master(&self) -> Option<PlayerId> {
        self.master
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.iter().any(|p| p.id() == player)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn player(&self, player: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id() == player)
    }

    /// Direct access to a player, for seeding positions.
    pub fn player_mut(&mut self, player: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id() == player)
    }

    pub fn deck(&self) -> &PieceDeck {
        &self.deck
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.id,
            name: self.name.clone(),
            state: self.state,
            solo: self.solo,
            master: self.master_name(),
            players: self.players.iter().map(Player::view).collect(),
            max_players: self.config.max_players,
        }
    }

    fn master_name(&self) -> Option<String> {
        self.master
            .and_then(|id| self.player(id))
            .map(|p| p.name().to_string())
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Adds a player. Refusals leave the room untouched.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        name: impl Into<String>,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let name = name.into();
        if self.contains(id) {
            return Err(RoomError::AlreadyInRoom(id));
        }
        if self.players.iter().any(|p| p.name() == name) {
            return Err(RoomError::UsernameTaken(name));
        }
        if !self.state.is_joinable() {
            return Err(RoomError::InGame(self.id));
        }
        if self.players.len() >= self.config.max_players {
            return Err(RoomError::RoomFull(self.id));
        }

        self.players
            .push(Player::new(id, name.clone(), sender.clone(), self.config.game));
        self.senders.insert(id, sender);
        info!(
            room_id = %self.id,
            player_id = %id,
            %name,
            players = self.players.len(),
            "player joined"
        );

        if self.players.len() == 1 {
            self.set_master(Some(id));
        } else {
            self.send_to(
                id,
                ServerEvent::Master {
                    username: self.master_name(),
                },
            );
        }
        self.broadcast_roster();
        Ok(())
    }

    /// Removes a player, stopping their simulation. The master role passes
    /// to the longest-standing remaining player.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<(), RoomError> {
        let index = self
            .players
            .iter()
            .position(|p| p.id() == id)
            .ok_or(RoomError::NotInRoom(id, self.id))?;

        let mut player = self.players.remove(index);
        player.teardown();
        self.senders.remove(&id);
        self.deck.forget(id);
        info!(
            room_id = %self.id,
            player_id = %id,
            players = self.players.len(),
            "player left"
        );

        if self.master == Some(id) {
            let next = self.players.first().map(Player::id);
            self.set_master(next);
        }
        self.broadcast_roster();

        if !self.players.is_empty() {
            self.check_end_of_game();
        }
        Ok(())
    }

    fn set_master(&mut self, master: Option<PlayerId>) {
        self.master = master;
        let username = self.master_name();
        if let Some(name) = &username {
            info!(room_id = %self.id, master = %name, "master changed");
        }
        self.dispatch(Recipient::All, ServerEvent::Master { username });
    }

    // -----------------------------------------------------------------------
    // Game
    // -----------------------------------------------------------------------

    /// Starts a game on behalf of `player`. Only the master may launch, and
    /// only while no game runs.
    pub fn launch(&mut self, player: PlayerId, now: Instant) -> bool {
        if self.master != Some(player) {
            debug!(room_id = %self.id, player_id = %player, "launch refused: not master");
            return false;
        }
        if !self.state.can_transition_to(RoomState::InGame) {
            debug!(room_id = %self.id, "launch refused: already in game");
            return false;
        }

        self.state = RoomState::InGame;
        self.solo = self.players.len() == 1;
        self.deck = match &self.forced {
            Some(kinds) => PieceDeck::from_sequence(kinds.clone()),
            None => PieceDeck::shuffled(self.config.piece_groups, &mut self.rng),
        };
        for player in &self.players {
            self.deck.register(player.id());
        }
        self.effects.clear();

        let mut link = Link {
            deck: &mut self.deck,
            effects: &mut self.effects,
        };
        for player in &mut self.players {
            player.init_game(&mut Ctx::new(now, true, &mut link));
        }
        info!(
            room_id = %self.id,
            players = self.players.len(),
            solo = self.solo,
            "game launched"
        );

        self.flush(now);
        true
    }

    /// Replaces the piece sequence of the running game and of every later
    /// launch. Cursors restart at the first piece.
    ///
    /// An empty sequence is refused: nobody could ever draw again.
    pub fn force_sequence(&mut self, kinds: Vec<PieceKind>) -> bool {
        if kinds.is_empty() {
            warn!(room_id = %self.id, "empty piece sequence refused");
            return false;
        }
        debug!(room_id = %self.id, pieces = kinds.len(), "piece sequence forced");
        self.deck.force_sequence(kinds.clone());
        self.forced = Some(kinds);
        true
    }

    /// Applies one input from `player`. Returns whether the room is in game.
    pub fn make_move(
        &mut self,
        player: PlayerId,
        mv: Move,
        now: Instant,
    ) -> Result<bool, RoomError> {
        self.with_player(player, now, |p, ctx| p.make_move(mv, ctx))
            .ok_or(RoomError::NotInRoom(player, self.id))?;
        Ok(self.state.is_active())
    }

    /// The earliest pending timer across all players.
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(self.players.iter().map(Player::next_deadline))
    }

    /// Fires every player timer due at or before `now`, in deadline order.
    /// Each fires at its own deadline. Returns how many fired.
    pub fn run_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some((deadline, id)) = self.next_due(now) {
            if self.with_player(id, deadline, |p, ctx| p.fire_due(ctx)) != Some(true) {
                break;
            }
            fired += 1;
        }
        fired
    }

    fn next_due(&self, now: Instant) -> Option<(Instant, PlayerId)> {
        self.players
            .iter()
            .filter_map(|p| {
                p.next_deadline()
                    .filter(|deadline| *deadline <= now)
                    .map(|deadline| (deadline, p.id()))
            })
            .min()
    }

    /// Stops every player's simulation.
    pub fn teardown(&mut self) {
        for player in &mut self.players {
            player.teardown();
        }
        self.effects.clear();
    }

    /// Runs `f` against one player with a link into this room, then fans
    /// out whatever the player reported.
    fn with_player<R>(
        &mut self,
        id: PlayerId,
        now: Instant,
        f: impl FnOnce(&mut Player, &mut Ctx<'_, Link<'_>>) -> R,
    ) -> Option<R> {
        let in_game = self.state.is_active();
        let player = self.players.iter_mut().find(|p| p.id() == id)?;
        let mut link = Link {
            deck: &mut self.deck,
            effects: &mut self.effects,
        };
        let result = f(player, &mut Ctx::new(now, in_game, &mut link));
        self.flush(now);
        Some(result)
    }

    fn flush(&mut self, now: Instant) {
        while let Some(effect) = self.effects.pop_front() {
            match effect {
                RoomEffect::Garbage { from, lines } => {
                    debug!(room_id = %self.id, player_id = %from, lines, "garbage sent");
                    let in_game = self.state.is_active();
                    let mut link = Link {
                        deck: &mut self.deck,
                        effects: &mut self.effects,
                    };
                    for player in self.players.iter_mut().filter(|p| p.id() != from) {
                        player.add_penalty_lines(lines, &mut Ctx::new(now, in_game, &mut link));
                    }
                }
                RoomEffect::SpinPenalty { from, multiplier } => {
                    debug!(room_id = %self.id, player_id = %from, multiplier, "speed penalty sent");
                    for player in self.players.iter_mut().filter(|p| p.id() != from) {
                        player.apply_spin_penalty(multiplier, now);
                    }
                }
                RoomEffect::SpectrumChanged => self.broadcast_spectrums(),
                RoomEffect::ToppedOut(_) => self.check_end_of_game(),
            }
        }
    }

    /// Ends the game once at most one player is alive. A solo game goes on
    /// while its only player lives.
    fn check_end_of_game(&mut self) {
        if !self.state.is_active() {
            return;
        }
        let alive: Vec<&Player> = self.players.iter().filter(|p| p.is_alive()).collect();
        if alive.len() > 1 || (self.solo && alive.len() == 1) {
            return;
        }

        let winner = if self.solo {
            None
        } else {
            alive.first().map(|p| p.name().to_string())
        };
        self.state = RoomState::Finished;
        info!(
            room_id = %self.id,
            winner = winner.as_deref().unwrap_or("none"),
            "game ended"
        );
        self.dispatch(Recipient::All, ServerEvent::GameEnd { winner });
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    fn broadcast_roster(&self) {
        let players = self.players.iter().map(|p| p.name().to_string()).collect();
        self.dispatch(Recipient::All, ServerEvent::Players { players });
    }

    fn broadcast_spectrums(&self) {
        let spectrums = self
            .players
            .iter()
            .map(|p| SpectrumEntry {
                username: p.name().to_string(),
                spectrum: p.spectrum().to_vec(),
            })
            .collect();
        self.dispatch(Recipient::All, ServerEvent::Spectrums { spectrums });
    }

    fn dispatch(&self, recipient: Recipient, event: ServerEvent) {
        for player in &self.players {
            if recipient.includes(player.id()) {
                self.send_to(player.id(), event.clone());
            }
        }
    }

    /// Silently drops the event if the receiver is gone.
    fn send_to(&self, player: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&player) {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    fn room_with(names: &[&str]) -> (Room, Vec<mpsc::UnboundedReceiver<ServerEvent>>) {
        let mut room = Room::new(
            RoomId(1),
            "lobby",
            RoomConfig {
                seed: Some(3),
                ..RoomConfig::default()
            },
        );
        let mut receivers = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let (tx, rx) = mpsc::unbounded_channel();
            room.add_player(PlayerId(i as u64 + 1), *name, tx).unwrap();
            receivers.push(rx);
        }
        (room, receivers)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_simultaneous_elimination_has_no_winner() {
        let (mut room, mut rx) = room_with(&["alice", "bob"]);
        assert!(room.launch(PlayerId(1), Instant::now()));
        drain(&mut rx[0]);

        for id in [PlayerId(1), PlayerId(2)] {
            room.player_mut(id).unwrap().teardown();
        }
        room.check_end_of_game();

        assert_eq!(room.state(), RoomState::Finished);
        assert_eq!(
            drain(&mut rx[0]),
            vec![ServerEvent::GameEnd { winner: None }]
        );
    }

    #[test]
    fn test_last_survivor_wins() {
        let (mut room, mut rx) = room_with(&["alice", "bob"]);
        room.launch(PlayerId(1), Instant::now());
        drain(&mut rx[1]);

        room.player_mut(PlayerId(1)).unwrap().teardown();
        room.check_end_of_game();

        assert_eq!(
            drain(&mut rx[1]),
            vec![ServerEvent::GameEnd {
                winner: Some("bob".into())
            }]
        );
    }

    #[test]
    fn test_solo_game_goes_on_while_player_lives() {
        let (mut room, mut rx) = room_with(&["alice"]);
        room.launch(PlayerId(1), Instant::now());
        assert!(room.is_solo());
        room.check_end_of_game();
        assert!(room.is_in_game());

        room.player_mut(PlayerId(1)).unwrap().teardown();
        room.check_end_of_game();
        assert!(!room.is_in_game());
        let events = drain(&mut rx[0]);
        assert_eq!(events.last(), Some(&ServerEvent::GameEnd { winner: None }));
    }

    #[test]
    fn test_end_of_game_ignored_outside_game() {
        let (mut room, mut rx) = room_with(&["alice", "bob"]);
        drain(&mut rx[0]);
        room.check_end_of_game();
        assert!(drain(&mut rx[0]).is_empty());
    }

    #[test]
    fn test_run_due_fires_in_deadline_order() {
        let (mut room, _rx) = room_with(&["alice", "bob"]);
        let t0 = Instant::now();
        room.launch(PlayerId(1), t0);
        assert_eq!(room.next_deadline(), Some(t0 + Duration::from_millis(1000)));

        // Two spawns, then two gravity ticks each.
        assert_eq!(room.run_due(t0 + Duration::from_millis(3000)), 6);
        for player in room.players() {
            assert_eq!(player.piece().map(|p| p.y), Some(2));
        }
    }
}
