//! Integration tests for the server context: dispatch, error boundary,
//! and full games driven through the public API on a paused clock.

use std::time::Duration;

use serde_json::{Value, json};
use stackfall::INTERNAL_ERROR;
use stackfall::prelude::*;
use tokio::sync::mpsc::UnboundedReceiver;

// =========================================================================
// Helpers
// =========================================================================

fn server() -> GameServer {
    let _ = tracing_subscriber::fmt::try_init();
    GameServer::builder().seed(42).build()
}

async fn send(
    server: &GameServer,
    player: PlayerId,
    event: &str,
    data: Value,
) -> Option<CommandReply> {
    server.dispatch(player, Envelope::new(event, data)).await
}

async fn create(
    server: &GameServer,
    player: PlayerId,
    room: &str,
    username: &str,
) -> Option<CommandReply> {
    send(server, player, "room:create", json!({ "room": room, "username": username })).await
}

async fn join(
    server: &GameServer,
    player: PlayerId,
    room: &str,
    username: &str,
) -> Option<CommandReply> {
    send(server, player, "room:join", json!({ "room": room, "username": username })).await
}

async fn play(server: &GameServer, player: PlayerId, mv: &str) -> Option<CommandReply> {
    send(server, player, "game:move", json!({ "move": mv })).await
}

fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn ack(ok: bool) -> Option<CommandReply> {
    Some(CommandReply::Ack(ok))
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_create_join_launch_replies() {
    let server = server();
    let (alice, _a) = server.connect().await;
    let (bob, _b) = server.connect().await;

    assert_eq!(create(&server, alice, "42Paris", "alice").await, ack(true));
    assert_eq!(
        join(&server, bob, "42Paris", "bob").await,
        Some(CommandReply::joined())
    );
    assert_eq!(server.username(bob).await.as_deref(), Some("bob"));

    // Only the master launches, and only once.
    assert_eq!(send(&server, bob, "game:launch", Value::Null).await, ack(false));
    assert_eq!(send(&server, alice, "game:launch", Value::Null).await, ack(true));
    assert_eq!(send(&server, alice, "game:launch", Value::Null).await, ack(false));

    let info = server.room_info(alice).await.unwrap().unwrap();
    assert!(info.in_game());
    assert_eq!(info.master.as_deref(), Some("alice"));
}

#[tokio::test(start_paused = true)]
async fn test_create_refused_for_taken_name_or_busy_player() {
    let server = server();
    let (alice, _a) = server.connect().await;
    let (carol, _c) = server.connect().await;

    assert_eq!(create(&server, alice, "42Paris", "alice").await, ack(true));
    assert_eq!(create(&server, carol, "42Paris", "carol").await, ack(false));
    assert_eq!(create(&server, alice, "Lyon", "alice").await, ack(false));
    assert_eq!(server.room_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_anonymous_room_is_solo_and_hidden() {
    let server = server();
    let (player, _rx) = server.connect().await;

    assert_eq!(send(&server, player, "room:create", json!({})).await, ack(true));

    let info = server.room_info(player).await.unwrap().unwrap();
    assert_eq!(info.name, "[Solo]");
    assert_eq!(info.players[0].name, "[Solo]");
    assert!(server.room_info_by_name("[Solo]").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fourteenth_join_is_room_full() {
    let server = server();
    let mut receivers = Vec::new();

    let (master, rx) = server.connect().await;
    receivers.push(rx);
    assert_eq!(create(&server, master, "full", "p0").await, ack(true));

    for i in 1..13 {
        let (player, rx) = server.connect().await;
        receivers.push(rx);
        assert_eq!(
            join(&server, player, "full", &format!("p{i}")).await,
            Some(CommandReply::joined()),
            "join #{} should succeed",
            i + 1
        );
    }

    let (late, _rx) = server.connect().await;
    assert_eq!(
        join(&server, late, "full", "p13").await,
        Some(CommandReply::refused(JoinFailure::RoomFull))
    );
    let info = server.room_info_by_name("full").await.unwrap().unwrap();
    assert_eq!(info.player_count(), 13);
}

#[tokio::test(start_paused = true)]
async fn test_join_reply_on_the_wire() {
    let server = server();
    let (player, _rx) = server.connect().await;

    let frame = br#"{"event":"room:join","data":{"room":"nowhere","username":"bob"}}"#;
    let reply = server.handle_frame(player, frame).await.unwrap().unwrap();
    let reply: Value = serde_json::from_slice(&reply).unwrap();
    assert_eq!(reply, json!({ "joined": false, "reason": "Room Not Found" }));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_passes_master_and_destroys_empty_room() {
    let server = server();
    let (alice, _a) = server.connect().await;
    let (bob, mut bob_rx) = server.connect().await;

    create(&server, alice, "42Paris", "alice").await;
    join(&server, bob, "42Paris", "bob").await;
    drain(&mut bob_rx);

    server.disconnect(alice).await;
    let events = drain(&mut bob_rx);
    assert!(events.contains(&ServerEvent::Master {
        username: Some("bob".into())
    }));
    assert!(events.contains(&ServerEvent::Players {
        players: vec!["bob".into()]
    }));
    assert_eq!(server.session_count().await, 1);
    assert_eq!(server.room_count().await, 1);

    server.disconnect(bob).await;
    assert_eq!(server.session_count().await, 0);
    assert_eq!(server.room_count().await, 0);

    // The name is free again.
    let (carol, _c) = server.connect().await;
    assert_eq!(create(&server, carol, "42Paris", "carol").await, ack(true));
}

// =========================================================================
// Error boundary
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_invalid_payload_reports_every_problem() {
    let server = server();
    let (player, mut rx) = server.connect().await;
    let data = json!({ "room": "bad name!", "username": "" });

    assert_eq!(send(&server, player, "room:join", data.clone()).await, None);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    let ServerEvent::Error { error_msg, origin } = &events[0] else {
        panic!("expected an error event, got {:?}", events[0]);
    };
    assert_eq!(
        error_msg,
        &ErrorMessage::Many(vec![
            "room must be alphanumeric".into(),
            "username must be at least 1 characters".into(),
        ])
    );
    assert_eq!(origin.event, "room:join");
    assert_eq!(origin.data, data);
    assert_eq!(server.room_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_move_error_on_the_wire() {
    let server = server();
    let (player, mut rx) = server.connect().await;

    let frame = br#"{"event":"game:move","data":{"move":"up"}}"#;
    assert!(server.handle_frame(player, frame).await.unwrap().is_none());

    let event = rx.try_recv().unwrap();
    let bytes = server.encode_event(&event).unwrap();
    let wire: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        wire,
        json!({
            "event": "error",
            "data": {
                "errorMsg": [
                    "move must be one of the following values: left, right, rotation, soft drop, hard drop"
                ],
                "origin": { "event": "game:move", "data": { "move": "up" } }
            }
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_event_is_ignored() {
    let server = server();
    let (player, mut rx) = server.connect().await;

    assert_eq!(send(&server, player, "chat:send", json!({ "text": "hi" })).await, None);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_a_protocol_error() {
    let server = server();
    let (player, _rx) = server.connect().await;

    let result = server.handle_frame(player, b"not json").await;
    assert!(matches!(result, Err(StackfallError::Protocol(_))));
}

#[tokio::test(start_paused = true)]
async fn test_command_from_unknown_player_fails_quietly() {
    let server = server();
    let (alice, mut rx) = server.connect().await;
    create(&server, alice, "42Paris", "alice").await;
    drain(&mut rx);

    // No session: the handler faults, nothing is created, nobody else hears.
    let ghost = PlayerId(999);
    assert_eq!(create(&server, ghost, "Lyon", "ghost").await, None);
    assert_eq!(server.room_count().await, 1);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(INTERNAL_ERROR, "Internal Server Error");
}

// =========================================================================
// Games
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_every_player_sees_the_same_first_piece() {
    let server = server();
    let (alice, _a) = server.connect().await;
    let (bob, _b) = server.connect().await;
    create(&server, alice, "42Paris", "alice").await;
    join(&server, bob, "42Paris", "bob").await;
    send(&server, alice, "game:launch", Value::Null).await;

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let info = server.room_info(bob).await.unwrap().unwrap();
    let kinds: Vec<_> = info
        .players
        .iter()
        .map(|p| p.piece.as_ref().unwrap().kind())
        .collect();
    assert_eq!(kinds.len(), 2);
    assert_eq!(kinds[0], kinds[1]);
}

#[tokio::test(start_paused = true)]
async fn test_left_move_after_spawn() {
    let server = server();
    let (player, _rx) = server.connect().await;
    create(&server, player, "solo1", "alice").await;

    // Out of game, moves are refused.
    assert_eq!(play(&server, player, "left").await, ack(false));

    send(&server, player, "game:launch", Value::Null).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let x = server.room_info(player).await.unwrap().unwrap().players[0]
        .piece
        .as_ref()
        .unwrap()
        .x;
    assert_eq!(play(&server, player, "left").await, ack(true));
    let info = server.room_info(player).await.unwrap().unwrap();
    assert_eq!(info.players[0].piece.as_ref().unwrap().x, x - 1);
}

#[tokio::test(start_paused = true)]
async fn test_move_without_room_replies_false() {
    let server = server();
    let (player, _rx) = server.connect().await;
    assert_eq!(play(&server, player, "hard drop").await, ack(false));
    assert_eq!(send(&server, player, "game:launch", Value::Null).await, ack(false));
}

#[tokio::test(start_paused = true)]
async fn test_solo_game_ends_without_winner() {
    let server = server();
    let (player, mut rx) = server.connect().await;
    send(&server, player, "room:create", json!({})).await;
    assert!(server.force_sequence(player, vec![PieceKind::O]).await.unwrap());
    send(&server, player, "game:launch", Value::Null).await;

    // Ten squares fill columns 4 and 5; the eleventh cannot spawn.
    for _ in 0..12 {
        tokio::time::sleep(Duration::from_millis(1100)).await;
        play(&server, player, "hard drop").await;
    }

    let ends: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::GameEnd { .. }))
        .collect();
    assert_eq!(ends, vec![ServerEvent::GameEnd { winner: None }]);

    let info = server.room_info(player).await.unwrap().unwrap();
    assert!(!info.in_game());
    assert!(info.solo);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_clears_everything() {
    let server = server();
    let (alice, _a) = server.connect().await;
    let (bob, _b) = server.connect().await;
    create(&server, alice, "one", "alice").await;
    create(&server, bob, "two", "bob").await;
    send(&server, alice, "game:launch", Value::Null).await;

    server.shutdown().await;
    assert_eq!(server.room_count().await, 0);
    assert_eq!(server.session_count().await, 0);
    assert!(server.room_info(alice).await.unwrap().is_none());
}
