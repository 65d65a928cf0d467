//! Error types for the session layer.

use stackfall_protocol::PlayerId;

/// Errors that can occur during session management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given player. Either they never
    /// connected or they already disconnected.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),
}
