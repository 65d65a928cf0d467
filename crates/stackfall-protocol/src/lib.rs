//! Wire protocol for Stackfall.
//!
//! - **Types** ([`Envelope`], [`ServerEvent`], [`CommandReply`], ids)
//! - **Commands** ([`Command`], [`Move`], per-event schemas with validation)
//! - **Codec** ([`Codec`] trait, [`JsonCodec`])
//! - **Errors** ([`ProtocolError`])
//!
//! ```text
//! frame bytes → Envelope → schema → Command → handler
//!                                   handler → ServerEvent / CommandReply → bytes
//! ```

mod codec;
pub mod commands;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use commands::{Command, Credentials, Move};
pub use error::ProtocolError;
pub use types::{
    CommandReply, Envelope, ErrorMessage, ErrorOrigin, JoinFailure, PlayerId, Recipient, RoomId,
    ServerEvent, SpectrumEntry,
};
