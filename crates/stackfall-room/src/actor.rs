//! Room actor: an isolated Tokio task that owns a [`Room`].
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Between commands the task sleeps until the
//! earliest player timer is due, so a room with no game in progress costs
//! nothing but a parked task.

use stackfall_core::{PieceKind, PlayerSender};
use stackfall_protocol::{Move, PlayerId, RoomId};
use stackfall_timer::sleep_until;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::{Room, RoomConfig, RoomError, RoomInfo};

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in most variants is a reply channel: the caller
/// sends a command and waits for the response on it.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        username: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Replies with the number of players left.
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },

    Launch {
        player_id: PlayerId,
        reply: oneshot::Sender<bool>,
    },

    /// Replies with whether the room is in game.
    Move {
        player_id: PlayerId,
        mv: Move,
        reply: oneshot::Sender<Result<bool, RoomError>>,
    },

    /// Replies `false` if the sequence was refused.
    ForceSequence {
        kinds: Vec<PieceKind>,
        reply: oneshot::Sender<bool>,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Shutdown,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn join(
        &self,
        player_id: PlayerId,
        username: impl Into<String>,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let username = username.into();
        self.request(|reply| RoomCommand::Join {
            player_id,
            username,
            sender,
            reply,
        })
        .await?
    }

    /// Removes the player and returns how many remain.
    pub async fn leave(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    pub async fn launch(&self, player_id: PlayerId) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::Launch { player_id, reply })
            .await
    }

    pub async fn make_move(&self, player_id: PlayerId, mv: Move) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::Move {
            player_id,
            mv,
            reply,
        })
        .await?
    }

    /// Forces the piece sequence for the running game and later launches.
    pub async fn force_sequence(&self, kinds: Vec<PieceKind>) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::ForceSequence { kinds, reply })
            .await
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

struct RoomActor {
    room: Room,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until shutdown or until every handle is dropped.
    async fn run(mut self) {
        let room_id = self.room.id();
        tracing::info!(%room_id, "room actor started");

        loop {
            tokio::select! {
                command = self.receiver.recv() => {
                    let Some(command) = command else { break };
                    // Timers that came due while the command waited run first.
                    self.room.run_due(Instant::now());
                    if !self.handle(command) {
                        break;
                    }
                }
                () = sleep_until(self.room.next_deadline()) => {
                    self.room.run_due(Instant::now());
                }
            }
        }

        self.room.teardown();
        tracing::info!(%room_id, "room actor stopped");
    }

    /// Returns `false` once the actor should stop.
    fn handle(&mut self, command: RoomCommand) -> bool {
        let now = Instant::now();
        match command {
            RoomCommand::Join {
                player_id,
                username,
                sender,
                reply,
            } => {
                let _ = reply.send(self.room.add_player(player_id, username, sender));
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self
                    .room
                    .remove_player(player_id)
                    .map(|()| self.room.len());
                let _ = reply.send(result);
            }
            RoomCommand::Launch { player_id, reply } => {
                let _ = reply.send(self.room.launch(player_id, now));
            }
            RoomCommand::Move {
                player_id,
                mv,
                reply,
            } => {
                let _ = reply.send(self.room.make_move(player_id, mv, now));
            }
            RoomCommand::ForceSequence { kinds, reply } => {
                let _ = reply.send(self.room.force_sequence(kinds));
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.room.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room.id(), "room shutting down");
                return false;
            }
        }
        true
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// `config.channel_size` bounds the command channel; senders wait when
/// it is full.
pub(crate) fn spawn_room(
    room_id: RoomId,
    name: impl Into<String>,
    config: RoomConfig,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let actor = RoomActor {
        room: Room::new(room_id, name, config),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
