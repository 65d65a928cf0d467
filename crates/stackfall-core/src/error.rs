//! Error types for the simulation core.

/// Raised when a piece is built from something that is not one of the
/// seven kinds. Only a programming error or a corrupted sequence gets here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PieceError {
    #[error("invalid piece type: {0:?}")]
    InvalidType(String),
}
