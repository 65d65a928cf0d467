//! The piece sequence shared by everyone in a room.
//!
//! The sequence is built from groups: each group is one shuffled copy of
//! the seven kinds, so every run of seven draws from a group boundary holds
//! each kind exactly once. Each player walks the same sequence with their
//! own cursor, which is what makes play fair at different speeds.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use stackfall_protocol::PlayerId;

use crate::piece::{Piece, PieceKind};

#[derive(Debug, Clone, Default)]
pub struct PieceDeck {
    sequence: Vec<PieceKind>,
    cursors: HashMap<PlayerId, usize>,
}

impl PieceDeck {
    /// `groups` independently shuffled copies of the seven kinds.
    pub fn shuffled<R: Rng + ?Sized>(groups: usize, rng: &mut R) -> Self {
        let mut sequence = Vec::with_capacity(groups * PieceKind::ALL.len());
        for _ in 0..groups {
            let mut group = PieceKind::ALL;
            group.shuffle(rng);
            sequence.extend_from_slice(&group);
        }
        Self::from_sequence(sequence)
    }

    /// A deck that deals exactly `sequence`, then wraps around.
    pub fn from_sequence(sequence: Vec<PieceKind>) -> Self {
        Self {
            sequence,
            cursors: HashMap::new(),
        }
    }

    /// Replaces the sequence and rewinds every registered cursor.
    pub fn force_sequence(&mut self, sequence: Vec<PieceKind>) {
        self.sequence = sequence;
        for cursor in self.cursors.values_mut() {
            *cursor = 0;
        }
    }

    /// Starts `player` at the beginning of the sequence.
    pub fn register(&mut self, player: PlayerId) {
        self.cursors.insert(player, 0);
    }

    pub fn forget(&mut self, player: PlayerId) {
        self.cursors.remove(&player);
    }

    /// Deals `player` a fresh piece at their cursor and advances it.
    /// Returns `None` for unregistered players or an empty sequence.
    pub fn draw(&mut self, player: PlayerId) -> Option<Piece> {
        let len = self.sequence.len();
        let cursor = self.cursors.get_mut(&player)?;
        let kind = *self.sequence.get(*cursor % len.max(1))?;
        *cursor = (*cursor + 1) % len;
        Some(Piece::new(kind))
    }

    pub fn cursor(&self, player: PlayerId) -> Option<usize> {
        self.cursors.get(&player).copied()
    }

    pub fn sequence(&self) -> &[PieceKind] {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_each_group_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        let deck = PieceDeck::shuffled(15, &mut rng);
        assert_eq!(deck.len(), 105);
        for group in deck.sequence().chunks(7) {
            let kinds: HashSet<_> = group.iter().collect();
            assert_eq!(kinds.len(), 7);
        }
    }

    #[test]
    fn test_players_at_same_cursor_get_same_kind() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut deck = PieceDeck::shuffled(2, &mut rng);
        let (a, b) = (PlayerId(1), PlayerId(2));
        deck.register(a);
        deck.register(b);

        let fast: Vec<_> = (0..10).filter_map(|_| deck.draw(a)).map(|p| p.kind()).collect();
        let slow: Vec<_> = (0..10).filter_map(|_| deck.draw(b)).map(|p| p.kind()).collect();
        assert_eq!(fast, slow);
    }

    #[test]
    fn test_cursor_wraps() {
        let mut deck = PieceDeck::from_sequence(vec![PieceKind::I, PieceKind::O]);
        let p = PlayerId(1);
        deck.register(p);
        let kinds: Vec<_> = (0..5).filter_map(|_| deck.draw(p)).map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![PieceKind::I, PieceKind::O, PieceKind::I, PieceKind::O, PieceKind::I]
        );
        assert_eq!(deck.cursor(p), Some(1));
    }

    #[test]
    fn test_unregistered_player_gets_nothing() {
        let mut deck = PieceDeck::from_sequence(vec![PieceKind::T]);
        assert!(deck.draw(PlayerId(9)).is_none());
        let mut empty = PieceDeck::default();
        empty.register(PlayerId(1));
        assert!(empty.draw(PlayerId(1)).is_none());
    }

    #[test]
    fn test_dealt_pieces_are_fresh() {
        let mut deck = PieceDeck::from_sequence(vec![PieceKind::S]);
        let p = PlayerId(1);
        deck.register(p);
        assert_eq!(deck.draw(p), Some(Piece::new(PieceKind::S)));
    }

    #[test]
    fn test_force_sequence_rewinds() {
        let mut deck = PieceDeck::from_sequence(vec![PieceKind::S, PieceKind::Z]);
        let p = PlayerId(1);
        deck.register(p);
        deck.draw(p);
        deck.force_sequence(vec![PieceKind::T]);
        assert_eq!(deck.cursor(p), Some(0));
        assert_eq!(deck.draw(p).map(|p| p.kind()), Some(PieceKind::T));
    }
}
