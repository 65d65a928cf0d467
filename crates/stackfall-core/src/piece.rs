//! Piece geometry: the seven kinds, their base shapes, clockwise rotation,
//! and per-kind wall-kick tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::COLS;
use crate::error::PieceError;

// ---------------------------------------------------------------------------
// PieceKind
// ---------------------------------------------------------------------------

/// One of the seven piece kinds. The discriminant is the cell value a
/// locked block of this kind leaves on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    I = 1,
    J = 2,
    L = 3,
    O = 4,
    S = 5,
    T = 6,
    Z = 7,
}

/// A (dx, dy) wall-kick offset. `dy` grows downward, like board rows.
pub type Kick = (i32, i32);

/// Kicks for J, L, S, T and Z, indexed by the rotation state being entered.
const KICKS_DEFAULT: [[Kick; 4]; 4] = [
    [(-1, 0), (-1, 1), (0, -2), (-1, -2)], // 3 -> 0
    [(-1, 0), (-1, -1), (0, 2), (-1, 2)],  // 0 -> 1
    [(1, 0), (1, 1), (0, -2), (1, -2)],    // 1 -> 2
    [(1, 0), (1, -1), (0, 2), (1, 2)],     // 2 -> 3
];

const KICKS_I: [[Kick; 4]; 4] = [
    [(1, 0), (-2, 0), (1, 2), (-2, -1)],  // 3 -> 0
    [(-2, 0), (1, 0), (-2, 1), (1, -2)],  // 0 -> 1
    [(-1, 0), (2, 0), (-1, -2), (2, 1)],  // 1 -> 2
    [(2, 0), (-1, 0), (2, -1), (-1, 2)],  // 2 -> 3
];

impl PieceKind {
    /// All kinds, in symbol order.
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::J,
        PieceKind::L,
        PieceKind::O,
        PieceKind::S,
        PieceKind::T,
        PieceKind::Z,
    ];

    /// The board cell value (1–7) for this kind.
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn symbol(self) -> char {
        match self {
            Self::I => 'I',
            Self::J => 'J',
            Self::L => 'L',
            Self::O => 'O',
            Self::S => 'S',
            Self::T => 'T',
            Self::Z => 'Z',
        }
    }

    /// The spawn orientation.
    pub fn base_shape(self) -> Shape {
        let v = self.value();
        match self {
            Self::I => Shape::from_rows(&[
                &[0, 0, 0, 0],
                &[v, v, v, v],
                &[0, 0, 0, 0],
                &[0, 0, 0, 0],
            ]),
            Self::J => Shape::from_rows(&[&[v, 0, 0], &[v, v, v], &[0, 0, 0]]),
            Self::L => Shape::from_rows(&[&[0, 0, v], &[v, v, v], &[0, 0, 0]]),
            Self::O => Shape::from_rows(&[&[v, v], &[v, v]]),
            Self::S => Shape::from_rows(&[&[0, v, v], &[v, v, 0], &[0, 0, 0]]),
            Self::T => Shape::from_rows(&[&[0, v, 0], &[v, v, v], &[0, 0, 0]]),
            Self::Z => Shape::from_rows(&[&[v, v, 0], &[0, v, v], &[0, 0, 0]]),
        }
    }

    /// Kick candidates for entering rotation state `entering`, in the order
    /// they are tried. The square never kicks.
    pub fn kicks(self, entering: u8) -> &'static [Kick] {
        let idx = usize::from(entering % 4);
        match self {
            Self::O => &[],
            Self::I => &KICKS_I[idx],
            _ => &KICKS_DEFAULT[idx],
        }
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for PieceKind {
    type Err = PieceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| s.len() == 1 && s.starts_with(kind.symbol()))
            .ok_or_else(|| PieceError::InvalidType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

/// A square matrix of cells, 2×2 up to 4×4. Zero is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    size: usize,
    cells: [[u8; 4]; 4],
}

impl Shape {
    fn from_rows(rows: &[&[u8]]) -> Self {
        let mut cells = [[0; 4]; 4];
        for (r, row) in rows.iter().enumerate() {
            cells[r][..row.len()].copy_from_slice(row);
        }
        Self {
            size: rows.len(),
            cells,
        }
    }

    /// Side length of the matrix.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Cell at `(row, col)`. Out-of-range reads are empty.
    pub fn get(&self, row: usize, col: usize) -> u8 {
        if row < self.size && col < self.size {
            self.cells[row][col]
        } else {
            0
        }
    }

    /// The matrix as nested rows, for display and assertions.
    pub fn rows(&self) -> Vec<Vec<u8>> {
        self.cells[..self.size]
            .iter()
            .map(|row| row[..self.size].to_vec())
            .collect()
    }

    /// The matrix turned 90° clockwise.
    pub fn rotated_cw(&self) -> Self {
        let n = self.size;
        let mut cells = [[0; 4]; 4];
        for i in 0..n {
            for j in 0..n {
                cells[j][n - 1 - i] = self.cells[i][j];
            }
        }
        Self { size: n, cells }
    }
}

// ---------------------------------------------------------------------------
// Piece
// ---------------------------------------------------------------------------

/// What a rotation attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateOutcome {
    /// Rotated in place.
    Rotated,
    /// Rotated after sliding by a kick offset. Counts as a spin.
    Kicked,
    /// Every position collided; shape and rotation state are unchanged.
    Blocked,
}

impl RotateOutcome {
    pub fn is_spin(self) -> bool {
        matches!(self, Self::Kicked)
    }
}

/// A live piece: kind, current orientation, and the board position of
/// its matrix's top-left corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    kind: PieceKind,
    shape: Shape,
    rotation: u8,
    /// Column of the matrix's left edge. May be negative near the left wall.
    pub x: i32,
    /// Row of the matrix's top edge. Negative rows are above the board.
    pub y: i32,
}

impl Piece {
    /// A piece at rotation 0, horizontally centred, on the top row.
    pub fn new(kind: PieceKind) -> Self {
        let shape = kind.base_shape();
        Self {
            kind,
            shape,
            rotation: 0,
            x: (COLS as i32 - shape.size() as i32) / 2,
            y: 0,
        }
    }

    /// Builds a piece from its one-letter symbol.
    ///
    /// # Errors
    /// Returns [`PieceError::InvalidType`] for anything but `I J L O S T Z`.
    pub fn from_symbol(symbol: &str) -> Result<Self, PieceError> {
        symbol.parse().map(Self::new)
    }

    /// A fresh piece of the same kind: rotation 0, spawn position.
    /// Unlike `clone`, nothing positional carries over.
    pub fn respawned(&self) -> Self {
        Self::new(self.kind)
    }

    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Rotation state, 0..=3.
    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    /// Occupied cells as `(x, y, value)` in board coordinates.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32, u8)> + '_ {
        let n = self.shape.size();
        (0..n).flat_map(move |row| {
            (0..n).filter_map(move |col| {
                let value = self.shape.get(row, col);
                (value != 0).then(|| (self.x + col as i32, self.y + row as i32, value))
            })
        })
    }

    /// Rotates 90° clockwise, trying wall kicks if the plain rotation
    /// collides. `collides` is asked about the piece in each candidate
    /// position.
    pub fn rotate<F>(&mut self, mut collides: F) -> RotateOutcome
    where
        F: FnMut(&Piece) -> bool,
    {
        let saved = self.shape;
        self.shape = saved.rotated_cw();
        self.rotation = (self.rotation + 1) % 4;

        if !collides(self) {
            return RotateOutcome::Rotated;
        }

        let (x, y) = (self.x, self.y);
        for &(dx, dy) in self.kind.kicks(self.rotation) {
            self.x = x + dx;
            self.y = y + dy;
            if !collides(self) {
                return RotateOutcome::Kicked;
            }
        }

        self.x = x;
        self.y = y;
        self.shape = saved;
        self.rotation = (self.rotation + 3) % 4;
        RotateOutcome::Blocked
    }
}
