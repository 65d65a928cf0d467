//! Unified error type for Stackfall.

use stackfall_protocol::ProtocolError;
use stackfall_room::RoomError;
use stackfall_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// Server entry points return this single type; `#[from]` lets `?`
/// convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum StackfallError {
    /// A frame could not be decoded or an event encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room refused a command or its actor is gone.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The player has no session.
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use stackfall_protocol::{PlayerId, RoomId};

    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownEvent("chat:send".into());
        let err: StackfallError = err.into();
        assert!(matches!(err, StackfallError::Protocol(_)));
        assert!(err.to_string().contains("chat:send"));
    }

    #[test]
    fn test_from_room_error() {
        let err: StackfallError = RoomError::Unavailable(RoomId(4)).into();
        assert!(matches!(err, StackfallError::Room(_)));
        assert!(err.to_string().contains("R-4"));
    }

    #[test]
    fn test_from_session_error() {
        let err: StackfallError = SessionError::NotFound(PlayerId(2)).into();
        assert!(matches!(err, StackfallError::Session(_)));
        assert!(err.to_string().contains("P-2"));
    }
}
