//! The 20 × 10 playfield and its collision and line rules.

use serde::{Deserialize, Serialize};

use crate::piece::Piece;

pub const ROWS: usize = 20;
pub const COLS: usize = 10;

/// Cell value of an empty cell.
pub const EMPTY: u8 = 0;
/// Cell value of a garbage cell. Rows containing one never clear.
pub const GARBAGE: u8 = 8;

pub type Row = [u8; COLS];

/// How a piece position conflicts with the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    None,
    Left,
    Right,
    Bottom,
    /// Overlaps an occupied cell. Reported ahead of any wall.
    Block,
}

/// A player's grid. Row 0 is the top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: Vec<Row>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            rows: vec![[EMPTY; COLS]; ROWS],
        }
    }

    /// Cell at `(x, y)`, or `None` outside the grid.
    pub fn cell(&self, x: i32, y: i32) -> Option<u8> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        self.rows.get(y)?.get(x).copied()
    }

    pub fn row(&self, y: usize) -> &Row {
        &self.rows[y]
    }

    /// Overwrites row `y`.
    pub fn set_row(&mut self, y: usize, row: Row) {
        self.rows[y] = row;
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Classifies where `piece` would sit. Cells above the top row are
    /// legal as long as they are inside the side walls.
    pub fn collision(&self, piece: &Piece) -> Collision {
        let mut found = Collision::None;
        for (x, y, _) in piece.cells() {
            if self.cell(x, y).is_some_and(|v| v != EMPTY) {
                return Collision::Block;
            }
            if found != Collision::None {
                continue;
            }
            if y >= ROWS as i32 {
                found = Collision::Bottom;
            } else if x < 0 {
                found = Collision::Left;
            } else if x >= COLS as i32 {
                found = Collision::Right;
            }
        }
        found
    }

    pub fn collides(&self, piece: &Piece) -> bool {
        self.collision(piece) != Collision::None
    }

    /// Stamps the piece's cells. Cells outside the grid are skipped.
    pub fn draw(&mut self, piece: &Piece) {
        for (x, y, value) in piece.cells() {
            self.set_cell(x, y, value);
        }
    }

    /// Clears the piece's cells.
    pub fn erase(&mut self, piece: &Piece) {
        for (x, y, _) in piece.cells() {
            self.set_cell(x, y, EMPTY);
        }
    }

    fn set_cell(&mut self, x: i32, y: i32, value: u8) {
        let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
            return;
        };
        if let Some(cell) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            *cell = value;
        }
    }

    /// Indices of rows made only of locked piece cells (values 1–7).
    pub fn full_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|&v| (1..=7).contains(&v)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Empties the given rows in place.
    pub fn blank_rows(&mut self, indices: &[usize]) {
        for &i in indices {
            if let Some(row) = self.rows.get_mut(i) {
                *row = [EMPTY; COLS];
            }
        }
    }

    /// Removes the given rows and inserts as many empty rows at the top.
    pub fn remove_rows(&mut self, indices: &[usize]) {
        let before = self.rows.len();
        let mut i = 0;
        self.rows.retain(|_| {
            let keep = !indices.contains(&i);
            i += 1;
            keep
        });
        let removed = before - self.rows.len();
        self.rows
            .splice(0..0, std::iter::repeat_n([EMPTY; COLS], removed));
    }

    /// Drops the top row and appends a full garbage row at the bottom.
    pub fn push_garbage_row(&mut self) {
        self.rows.remove(0);
        self.rows.push([GARBAGE; COLS]);
    }

    /// Stack height per column: rows from the first occupied cell down.
    pub fn spectrum(&self) -> Vec<u8> {
        (0..COLS)
            .map(|x| {
                let top = self
                    .rows
                    .iter()
                    .position(|row| row[x] != EMPTY)
                    .unwrap_or(ROWS);
                (ROWS - top) as u8
            })
            .collect()
    }

    /// All cells, row-major.
    pub fn flatten(&self) -> Vec<u8> {
        self.rows.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::PieceKind;

    fn filled(value: u8) -> Row {
        [value; COLS]
    }

    #[test]
    fn test_row_clears_only_with_piece_cells() {
        let mut board = Board::new();
        board.set_row(19, filled(3));
        let mut mixed = filled(1);
        mixed[4] = 7;
        board.set_row(18, mixed);
        let mut with_hole = filled(2);
        with_hole[9] = EMPTY;
        board.set_row(17, with_hole);
        let mut with_garbage = filled(2);
        with_garbage[0] = GARBAGE;
        board.set_row(16, with_garbage);
        board.set_row(15, filled(GARBAGE));

        assert_eq!(board.full_rows(), vec![18, 19]);
    }

    #[test]
    fn test_remove_rows_shifts_down() {
        let mut board = Board::new();
        let mut marker = [EMPTY; COLS];
        marker[0] = 5;
        board.set_row(17, marker);
        board.set_row(18, filled(1));
        board.set_row(19, filled(1));

        board.remove_rows(&[18, 19]);
        assert_eq!(board.row(19), &marker);
        assert_eq!(board.row(0), &[EMPTY; COLS]);
        assert_eq!(board.rows().len(), ROWS);
    }

    #[test]
    fn test_garbage_row_pushes_up() {
        let mut board = Board::new();
        board.set_row(19, filled(2));
        board.push_garbage_row();
        assert_eq!(board.row(18), &filled(2));
        assert_eq!(board.row(19), &filled(GARBAGE));
    }

    #[test]
    fn test_spectrum_heights() {
        let mut board = Board::new();
        let mut row = [EMPTY; COLS];
        row[0] = 1;
        board.set_row(19, row);
        row[2] = 4;
        board.set_row(10, row);
        let spectrum = board.spectrum();
        assert_eq!(spectrum[0], 10);
        assert_eq!(spectrum[1], 0);
        assert_eq!(spectrum[2], 10);
    }

    #[test]
    fn test_collision_kinds() {
        let board = Board::new();
        let mut piece = Piece::new(PieceKind::O);
        assert_eq!(board.collision(&piece), Collision::None);

        piece.x = -1;
        assert_eq!(board.collision(&piece), Collision::Left);
        piece.x = COLS as i32 - 1;
        assert_eq!(board.collision(&piece), Collision::Right);
        piece.x = 0;
        piece.y = ROWS as i32 - 1;
        assert_eq!(board.collision(&piece), Collision::Bottom);
        piece.y = -2;
        assert_eq!(board.collision(&piece), Collision::None);
    }

    #[test]
    fn test_block_wins_over_walls() {
        let mut board = Board::new();
        board.set_row(19, filled(1));
        let mut piece = Piece::new(PieceKind::O);
        piece.x = -1;
        piece.y = 18;
        assert_eq!(board.collision(&piece), Collision::Block);
    }

    #[test]
    fn test_draw_and_erase() {
        let mut board = Board::new();
        let piece = Piece::new(PieceKind::O);
        board.draw(&piece);
        assert_eq!(board.cell(4, 0), Some(4));
        assert_eq!(board.cell(5, 1), Some(4));
        assert_eq!(board.flatten().iter().filter(|&&v| v != 0).count(), 4);
        board.erase(&piece);
        assert_eq!(board, Board::new());
    }

    #[test]
    fn test_draw_skips_cells_above_board() {
        let mut board = Board::new();
        let mut piece = Piece::new(PieceKind::O);
        piece.y = -1;
        board.draw(&piece);
        assert_eq!(board.flatten().iter().filter(|&&v| v != 0).count(), 2);
    }
}
