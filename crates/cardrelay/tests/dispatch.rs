//! Dispatcher tests with simulated connections.
//!
//! The dispatcher is a synchronous state machine behind a channel, so
//! these tests drive it directly: each "connection" is just an unbounded
//! receiver registered through a `Connect` event, and assertions drain
//! whatever the dispatcher queued for it.

use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use cardrelay::prelude::*;
use cardrelay::{Dispatcher, RelayEvent};

struct Harness {
    dispatcher: Dispatcher,
    next_id: u64,
}

impl Harness {
    fn new() -> Self {
        Self {
            dispatcher: Dispatcher::new(
                RoomRegistry::new(),
                RoomId::new(DEFAULT_ROOM),
            ),
            next_id: 1,
        }
    }

    fn connect(&mut self) -> (ConnId, UnboundedReceiver<ServerMessage>) {
        let conn = ConnId::new(self.next_id);
        self.next_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.dispatcher
            .handle_event(RelayEvent::Connect { conn, sender: tx });
        (conn, rx)
    }

    /// Sends a message in its wire shape, so the test doubles as a
    /// check that the shape decodes.
    fn send(&mut self, conn: ConnId, raw: serde_json::Value) {
        let msg: ClientMessage =
            serde_json::from_value(raw).expect("test message must decode");
        self.dispatcher.handle_event(RelayEvent::Message { conn, msg });
    }

    fn disconnect(&mut self, conn: ConnId) {
        self.dispatcher.handle_event(RelayEvent::Disconnect { conn });
    }
}

fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn sit(harness: &mut Harness, conn: ConnId, seat: u8, name: &str) {
    harness.send(
        conn,
        json!({"type": "requestSeat", "seat": seat, "playerName": name}),
    );
}

// =========================================================================
// Connect
// =========================================================================

#[test]
fn test_connect_receives_seat_snapshot() {
    let mut harness = Harness::new();
    let (_, mut rx) = harness.connect();

    let msgs = drain(&mut rx);
    assert_eq!(msgs.len(), 1);
    match &msgs[0] {
        ServerMessage::SeatUpdate { seats, spectators } => {
            assert_eq!(seats.len(), SEAT_COUNT);
            assert!(seats.values().all(|info| !info.occupied));
            assert_eq!(*spectators, 0);
        }
        other => panic!("expected seatUpdate snapshot, got {other:?}"),
    }
}

#[test]
fn test_late_joiner_snapshot_reflects_current_seats() {
    let mut harness = Harness::new();
    let (alice, _rx) = harness.connect();
    sit(&mut harness, alice, 2, "Alice");

    let (_, mut rx) = harness.connect();
    match drain(&mut rx).pop() {
        Some(ServerMessage::SeatUpdate { seats, .. }) => {
            assert!(seats[&2].occupied);
            assert!(seats[&2].is_host);
            assert_eq!(seats[&2].player_name, "Alice");
        }
        other => panic!("expected seatUpdate snapshot, got {other:?}"),
    }
}

// =========================================================================
// Seats
// =========================================================================

#[test]
fn test_seat_grant_unicast_and_broadcast() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (_, mut bob_rx) = harness.connect();
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    sit(&mut harness, alice, 2, "Alice");

    let alice_msgs = drain(&mut alice_rx);
    assert_eq!(
        alice_msgs[0],
        ServerMessage::SeatGranted {
            seat: 2,
            is_host: true,
            player_name: "Alice".into(),
        }
    );
    // The broadcast reaches the requester too.
    assert!(matches!(alice_msgs[1], ServerMessage::SeatUpdate { .. }));

    match drain(&mut bob_rx).pop() {
        Some(ServerMessage::SeatUpdate { seats, .. }) => {
            assert!(seats[&2].occupied);
            assert_eq!(seats[&2].player_name, "Alice");
        }
        other => panic!("expected seatUpdate, got {other:?}"),
    }
}

#[test]
fn test_denied_seat_request_is_unicast_only() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 2, "Alice");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    sit(&mut harness, bob, 2, "Bob");

    assert_eq!(
        drain(&mut bob_rx),
        vec![ServerMessage::SeatDenied {
            error: "Seat is already taken".into()
        }]
    );
    // No broadcast for a denial.
    assert!(drain(&mut alice_rx).is_empty());
}

#[test]
fn test_invalid_seat_number_denied() {
    let mut harness = Harness::new();
    let (alice, mut rx) = harness.connect();
    drain(&mut rx);

    sit(&mut harness, alice, 7, "Alice");

    assert_eq!(
        drain(&mut rx),
        vec![ServerMessage::SeatDenied { error: "Invalid seat number".into() }]
    );
}

#[test]
fn test_leave_seat_broadcasts_update() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (_, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.send(alice, json!({"type": "leaveSeat"}));

    match drain(&mut bob_rx).pop() {
        Some(ServerMessage::SeatUpdate { seats, .. }) => {
            assert!(!seats[&1].occupied);
        }
        other => panic!("expected seatUpdate, got {other:?}"),
    }
}

#[test]
fn test_leave_seat_while_unseated_is_silently_ignored() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (unseated, mut unseated_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    drain(&mut alice_rx);
    drain(&mut unseated_rx);

    harness.send(unseated, json!({"type": "leaveSeat"}));

    // No reply and no broadcast — the failed leave is a no-op.
    assert!(drain(&mut unseated_rx).is_empty());
    assert!(drain(&mut alice_rx).is_empty());
}

// =========================================================================
// Spectators
// =========================================================================

#[test]
fn test_spectator_count_broadcast_on_join_and_leave() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (watcher, mut watcher_rx) = harness.connect();
    drain(&mut alice_rx);
    drain(&mut watcher_rx);

    harness.send(watcher, json!({"type": "spectateJoin"}));
    assert_eq!(
        drain(&mut alice_rx),
        vec![ServerMessage::SpectatorsUpdate { spectators: 1 }]
    );

    harness.send(watcher, json!({"type": "spectateLeave"}));
    assert_eq!(
        drain(&mut alice_rx),
        vec![ServerMessage::SpectatorsUpdate { spectators: 0 }]
    );
    let _ = alice;
}

#[test]
fn test_spectate_join_unicasts_seat_snapshot() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (watcher, mut watcher_rx) = harness.connect();
    sit(&mut harness, alice, 2, "Alice");
    drain(&mut alice_rx);
    drain(&mut watcher_rx);

    harness.send(watcher, json!({"type": "spectateJoin"}));

    // The joiner hears the count change and then gets the seat table.
    let msgs = drain(&mut watcher_rx);
    assert_eq!(msgs[0], ServerMessage::SpectatorsUpdate { spectators: 1 });
    match &msgs[1] {
        ServerMessage::SeatUpdate { seats, spectators } => {
            assert!(seats[&2].occupied);
            assert_eq!(seats[&2].player_name, "Alice");
            assert_eq!(*spectators, 1);
        }
        other => panic!("expected seatUpdate for the joiner, got {other:?}"),
    }
    // Everyone else only hears the count change.
    assert_eq!(
        drain(&mut alice_rx),
        vec![ServerMessage::SpectatorsUpdate { spectators: 1 }]
    );
}

// =========================================================================
// Starting the game
// =========================================================================

#[test]
fn test_non_host_start_game_denied_without_broadcast() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice"); // host
    sit(&mut harness, bob, 2, "Bob");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.send(bob, json!({"type": "startGame", "fullState": {"deck": []}}));

    assert_eq!(
        drain(&mut bob_rx),
        vec![ServerMessage::StartGameDenied {
            error: "Only the host can start the game".into()
        }]
    );
    assert!(drain(&mut alice_rx).is_empty());
}

#[test]
fn test_host_start_game_without_state_denied() {
    let mut harness = Harness::new();
    let (alice, mut rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    drain(&mut rx);

    harness.send(alice, json!({"type": "startGame"}));
    assert_eq!(
        drain(&mut rx),
        vec![ServerMessage::StartGameDenied {
            error: "Invalid game state provided".into()
        }]
    );

    // Null and blank scalars are as invalid as an absent state.
    for state in [json!(null), json!(""), json!(0), json!(false)] {
        harness.send(alice, json!({"type": "startGame", "fullState": state}));
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::StartGameDenied {
                error: "Invalid game state provided".into()
            }],
            "state {state} must be rejected"
        );
    }
}

#[test]
fn test_host_start_game_broadcasts_to_everyone() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    sit(&mut harness, bob, 2, "Bob");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    let state = json!({"deck": ["AS", "KD"], "turn": 1});
    harness.send(alice, json!({"type": "startGame", "fullState": state}));

    let expected = ServerMessage::GameStarted {
        full_state: json!({"deck": ["AS", "KD"], "turn": 1}),
    };
    assert_eq!(drain(&mut alice_rx), vec![expected.clone()]);
    assert_eq!(drain(&mut bob_rx), vec![expected]);
}

// =========================================================================
// Action relay
// =========================================================================

#[test]
fn test_action_relayed_to_others_with_seat_stamp() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    let (watcher, mut watcher_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    sit(&mut harness, bob, 3, "Bob");
    drain(&mut alice_rx);
    drain(&mut bob_rx);
    drain(&mut watcher_rx);

    harness.send(
        bob,
        json!({"type": "action", "action": {"type": "discard", "cardId": "7H"}}),
    );

    // Everyone but the sender hears it, spectators included.
    let expected = ServerMessage::RemoteAction {
        player_seat: 3,
        action: ActionPayload::Known(GameAction::Discard {
            card_id: json!("7H"),
        }),
    };
    assert_eq!(drain(&mut alice_rx), vec![expected.clone()]);
    assert_eq!(drain(&mut watcher_rx), vec![expected]);
    assert!(drain(&mut bob_rx).is_empty());
    let _ = watcher;
}

#[test]
fn test_unknown_action_kind_passes_through_verbatim() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    sit(&mut harness, bob, 2, "Bob");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.send(
        bob,
        json!({"type": "action", "action": {"type": "drawStock", "count": 2}}),
    );

    match drain(&mut alice_rx).pop() {
        Some(ServerMessage::RemoteAction { player_seat, action }) => {
            assert_eq!(player_seat, 2);
            assert_eq!(action.kind(), Some("drawStock"));
            assert_eq!(
                serde_json::to_value(&action).unwrap(),
                json!({"type": "drawStock", "count": 2})
            );
        }
        other => panic!("expected remoteAction, got {other:?}"),
    }
}

#[test]
fn test_action_from_unseated_connection_dropped() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (watcher, mut watcher_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    drain(&mut alice_rx);
    drain(&mut watcher_rx);

    harness.send(
        watcher,
        json!({"type": "action", "action": {"type": "discard", "cardId": "7H"}}),
    );

    assert!(drain(&mut alice_rx).is_empty());
    assert!(drain(&mut watcher_rx).is_empty());
}

#[test]
fn test_action_without_kind_dropped() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    sit(&mut harness, bob, 2, "Bob");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.send(bob, json!({"type": "action", "action": {"cardId": "7H"}}));
    harness.send(bob, json!({"type": "action", "action": {"type": ""}}));

    assert!(drain(&mut alice_rx).is_empty());
}

// =========================================================================
// State sync
// =========================================================================

#[test]
fn test_checksum_rebroadcast_includes_sender_and_keeps_ts() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    sit(&mut harness, bob, 2, "Bob");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.send(
        bob,
        json!({"type": "stateChecksum", "checksum": "deadbeef", "ts": 12345}),
    );

    let expected = ServerMessage::StateChecksum {
        checksum: "deadbeef".into(),
        ts: 12345,
    };
    assert_eq!(drain(&mut alice_rx), vec![expected.clone()]);
    assert_eq!(drain(&mut bob_rx), vec![expected]);
}

#[test]
fn test_checksum_without_ts_gets_stamped() {
    let mut harness = Harness::new();
    let (alice, mut rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    drain(&mut rx);

    harness.send(alice, json!({"type": "stateChecksum", "checksum": "abc"}));

    match drain(&mut rx).pop() {
        Some(ServerMessage::StateChecksum { checksum, ts }) => {
            assert_eq!(checksum, "abc");
            assert!(ts > 0, "missing ts must be stamped server-side");
        }
        other => panic!("expected stateChecksum, got {other:?}"),
    }
}

#[test]
fn test_request_full_state_forwarded_to_host() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice"); // host
    sit(&mut harness, bob, 2, "Bob");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.send(bob, json!({"type": "requestFullState"}));

    assert_eq!(
        drain(&mut alice_rx),
        vec![ServerMessage::RequestFullState { requester: bob }]
    );
    assert!(drain(&mut bob_rx).is_empty());
}

#[test]
fn test_request_full_state_without_host_dropped() {
    let mut harness = Harness::new();
    let (watcher, mut rx) = harness.connect();
    drain(&mut rx);

    harness.send(watcher, json!({"type": "requestFullState"}));
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_targeted_full_state_update_reaches_only_target() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    let (carol, mut carol_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    sit(&mut harness, bob, 2, "Bob");
    drain(&mut alice_rx);
    drain(&mut bob_rx);
    drain(&mut carol_rx);

    harness.send(
        alice,
        json!({
            "type": "fullStateUpdate",
            "to": bob.into_inner(),
            "fullState": {"deck": []},
            "checksum": "abc123"
        }),
    );

    assert_eq!(
        drain(&mut bob_rx),
        vec![ServerMessage::FullStateUpdate {
            full_state: json!({"deck": []}),
            checksum: Some("abc123".into()),
            from_host: true,
        }]
    );
    assert!(drain(&mut alice_rx).is_empty());
    assert!(drain(&mut carol_rx).is_empty());
}

#[test]
fn test_untargeted_full_state_update_broadcasts() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.send(
        alice,
        json!({"type": "fullStateUpdate", "fullState": {"deck": []}}),
    );

    let expected = ServerMessage::FullStateUpdate {
        full_state: json!({"deck": []}),
        checksum: None,
        from_host: true,
    };
    assert_eq!(drain(&mut alice_rx), vec![expected.clone()]);
    assert_eq!(drain(&mut bob_rx), vec![expected]);
    let _ = bob;
}

#[test]
fn test_full_state_update_without_state_dropped() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.send(alice, json!({"type": "fullStateUpdate"}));
    harness.send(alice, json!({"type": "fullStateUpdate", "fullState": null}));
    harness.send(alice, json!({"type": "fullStateUpdate", "fullState": ""}));

    assert!(drain(&mut bob_rx).is_empty());
    let _ = bob;
}

// =========================================================================
// Chat
// =========================================================================

#[test]
fn test_chat_and_typing_skip_the_sender() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.send(
        alice,
        json!({"type": "chat", "playerId": 1, "message": "nice meld"}),
    );
    harness.send(
        alice,
        json!({"type": "typing", "playerId": 1, "isTyping": true}),
    );

    assert_eq!(
        drain(&mut bob_rx),
        vec![
            ServerMessage::ChatMessage {
                player_id: json!(1),
                message: "nice meld".into(),
            },
            ServerMessage::Typing { player_id: json!(1), is_typing: true },
        ]
    );
    assert!(drain(&mut alice_rx).is_empty());
}

// =========================================================================
// Disconnect
// =========================================================================

#[test]
fn test_host_disconnect_reassigns_host() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice"); // host
    sit(&mut harness, bob, 3, "Bob");
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.disconnect(alice);

    match drain(&mut bob_rx).pop() {
        Some(ServerMessage::SeatUpdate { seats, .. }) => {
            assert!(!seats[&1].occupied);
            assert!(seats[&3].is_host, "host must move to the survivor");
        }
        other => panic!("expected seatUpdate, got {other:?}"),
    }
}

#[test]
fn test_disconnect_of_unseated_connection_still_broadcasts() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (watcher, mut watcher_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    harness.send(watcher, json!({"type": "spectateJoin"}));
    drain(&mut alice_rx);
    drain(&mut watcher_rx);

    harness.disconnect(watcher);

    // The departure is always announced, even without a seat.
    assert!(matches!(
        drain(&mut alice_rx).pop(),
        Some(ServerMessage::SeatUpdate { .. })
    ));
}

#[test]
fn test_room_removed_when_last_seat_vacated() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (watcher, mut watcher_rx) = harness.connect();
    sit(&mut harness, alice, 2, "Alice");
    harness.send(watcher, json!({"type": "spectateJoin"}));
    drain(&mut alice_rx);
    drain(&mut watcher_rx);

    // Spectators don't keep the room alive.
    harness.disconnect(alice);
    drain(&mut watcher_rx);

    // The recreated room starts fresh: no seats, no spectators.
    let (_, mut rx) = harness.connect();
    match drain(&mut rx).pop() {
        Some(ServerMessage::SeatUpdate { seats, spectators }) => {
            assert!(seats.values().all(|info| !info.occupied));
            assert_eq!(spectators, 0);
        }
        other => panic!("expected seatUpdate snapshot, got {other:?}"),
    }
}

#[test]
fn test_disconnected_connection_receives_nothing() {
    let mut harness = Harness::new();
    let (alice, mut alice_rx) = harness.connect();
    let (bob, mut bob_rx) = harness.connect();
    sit(&mut harness, alice, 1, "Alice");
    harness.disconnect(bob);
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.send(alice, json!({"type": "leaveSeat"}));

    assert!(drain(&mut bob_rx).is_empty());
}
