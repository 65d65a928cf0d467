//! Connected-player registry for Stackfall.
//!
//! A session is the server's record of one connection: the [`PlayerId`]
//! it was given, the channel its outbound events travel on, and the name
//! it currently plays under.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server context (above)  ← looks up senders and names per command
//!     ↕
//! Session Layer (this crate)  ← allocates ids, owns outbound channels
//!     ↕
//! Protocol / Core (below)  ← PlayerId, ServerEvent, PlayerSender
//! ```
//!
//! [`PlayerId`]: stackfall_protocol::PlayerId

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::Session;
