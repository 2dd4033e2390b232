//! The relay dispatcher: a single actor task that owns all room state.
//!
//! Connection handlers never touch rooms directly. They translate socket
//! activity into [`RelayEvent`]s and push them down one mpsc channel; the
//! dispatcher consumes that channel in order, so every room mutation and
//! the broadcasts it triggers are serialized without locks. Outbound
//! delivery is fire-and-forget — each connection registers an unbounded
//! sender at connect time and a slow or dead peer never blocks the loop.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use cardrelay_protocol::{ClientMessage, ConnId, RoomId, ServerMessage};
use cardrelay_room::RoomRegistry;

/// Sending half of a connection's outbound queue.
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

/// An event for the dispatcher to process.
#[derive(Debug)]
pub enum RelayEvent {
    /// A connection was accepted and its writer is ready.
    Connect { conn: ConnId, sender: ClientSender },
    /// A decoded message arrived from a connection.
    Message { conn: ConnId, msg: ClientMessage },
    /// A connection went away, cleanly or not.
    Disconnect { conn: ConnId },
}

/// Owns the room registry and the routing tables.
///
/// Exposed as a plain struct with a synchronous [`handle_event`] so it
/// can be driven directly in tests with simulated connections; the
/// server wraps it in a spawned task via [`spawn_dispatcher`].
///
/// [`handle_event`]: Dispatcher::handle_event
#[derive(Debug)]
pub struct Dispatcher {
    registry: RoomRegistry,
    default_room: RoomId,
    /// Which room each live connection belongs to.
    conn_rooms: HashMap<ConnId, RoomId>,
    /// Outbound queue for each live connection.
    senders: HashMap<ConnId, ClientSender>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given registry. Every connection
    /// is routed into `default_room` for now.
    pub fn new(registry: RoomRegistry, default_room: RoomId) -> Self {
        Self {
            registry,
            default_room,
            conn_rooms: HashMap::new(),
            senders: HashMap::new(),
        }
    }

    /// Processes one event to completion, including all sends it
    /// triggers.
    pub fn handle_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connect { conn, sender } => self.on_connect(conn, sender),
            RelayEvent::Message { conn, msg } => self.on_message(conn, msg),
            RelayEvent::Disconnect { conn } => self.on_disconnect(conn),
        }
    }

    fn on_connect(&mut self, conn: ConnId, sender: ClientSender) {
        let room_id = self.default_room.clone();
        tracing::info!(%conn, room_id = %room_id, "client connected");

        self.senders.insert(conn, sender);
        self.conn_rooms.insert(conn, room_id.clone());

        // Immediate snapshot so a late joiner can render the table.
        let room = self.registry.get_or_create(&room_id);
        let snapshot = ServerMessage::SeatUpdate {
            seats: room.seat_status(),
            spectators: room.spectator_count(),
        };
        self.send_to(conn, snapshot);
    }

    fn on_message(&mut self, conn: ConnId, msg: ClientMessage) {
        let Some(room_id) = self.conn_rooms.get(&conn).cloned() else {
            tracing::warn!(%conn, "message from unregistered connection");
            return;
        };

        match msg {
            ClientMessage::RequestSeat { seat, player_name } => {
                self.request_seat(conn, &room_id, seat, player_name)
            }
            ClientMessage::LeaveSeat => self.leave_seat(conn, &room_id),
            ClientMessage::SpectateJoin => self.spectate(conn, &room_id, true),
            ClientMessage::SpectateLeave => self.spectate(conn, &room_id, false),
            ClientMessage::StartGame { full_state } => {
                self.start_game(conn, &room_id, full_state)
            }
            ClientMessage::Action { action } => self.relay_action(conn, &room_id, action),
            ClientMessage::StateChecksum { checksum, ts } => {
                let ts = ts.unwrap_or_else(now_millis);
                self.broadcast(
                    &room_id,
                    ServerMessage::StateChecksum { checksum, ts },
                    None,
                );
            }
            ClientMessage::RequestFullState => self.request_full_state(conn, &room_id),
            ClientMessage::FullStateUpdate { to, full_state, checksum } => {
                self.full_state_update(conn, &room_id, to, full_state, checksum)
            }
            ClientMessage::Chat { player_id, message } => self.broadcast(
                &room_id,
                ServerMessage::ChatMessage { player_id, message },
                Some(conn),
            ),
            ClientMessage::Typing { player_id, is_typing } => self.broadcast(
                &room_id,
                ServerMessage::Typing { player_id, is_typing },
                Some(conn),
            ),
        }
    }

    fn on_disconnect(&mut self, conn: ConnId) {
        self.senders.remove(&conn);
        let Some(room_id) = self.conn_rooms.remove(&conn) else {
            return;
        };
        tracing::info!(%conn, room_id = %room_id, "client disconnected");

        let room = self.registry.get_or_create(&room_id);
        let _ = room.leave_seat(conn);
        room.spectator_leave(conn);
        let empty = room.is_empty();

        // Remaining members always hear about the departure, even if the
        // connection held no seat.
        self.broadcast_seat_update(&room_id);

        if empty {
            self.registry.remove(&room_id);
        }
    }

    // -----------------------------------------------------------------
    // Seat operations
    // -----------------------------------------------------------------

    fn request_seat(
        &mut self,
        conn: ConnId,
        room_id: &RoomId,
        seat: u8,
        player_name: Option<String>,
    ) {
        let result = self
            .registry
            .get_or_create(room_id)
            .request_seat(conn, seat, player_name);

        match result {
            Ok(grant) => {
                self.send_to(
                    conn,
                    ServerMessage::SeatGranted {
                        seat: grant.seat,
                        is_host: grant.is_host,
                        player_name: grant.player_name,
                    },
                );
                self.broadcast_seat_update(room_id);
            }
            Err(err) => {
                tracing::debug!(%conn, seat, error = %err, "seat request denied");
                self.send_to(conn, ServerMessage::SeatDenied { error: err.to_string() });
            }
        }
    }

    fn leave_seat(&mut self, conn: ConnId, room_id: &RoomId) {
        // A failed leave is a silent no-op; only a real vacate is
        // announced.
        match self.registry.get_or_create(room_id).leave_seat(conn) {
            Ok(_) => self.broadcast_seat_update(room_id),
            Err(err) => {
                tracing::debug!(%conn, error = %err, "leaveSeat ignored");
            }
        }
    }

    fn spectate(&mut self, conn: ConnId, room_id: &RoomId, join: bool) {
        let room = self.registry.get_or_create(room_id);
        if join {
            room.spectator_join(conn);
        } else {
            room.spectator_leave(conn);
        }
        let spectators = room.spectator_count();
        let snapshot = join.then(|| ServerMessage::SeatUpdate {
            seats: room.seat_status(),
            spectators,
        });
        self.broadcast(room_id, ServerMessage::SpectatorsUpdate { spectators }, None);
        // A new spectator also gets the current seat table to render.
        if let Some(snapshot) = snapshot {
            self.send_to(conn, snapshot);
        }
    }

    // -----------------------------------------------------------------
    // Game flow
    // -----------------------------------------------------------------

    fn start_game(
        &mut self,
        conn: ConnId,
        room_id: &RoomId,
        full_state: Option<serde_json::Value>,
    ) {
        let host = self.registry.get_or_create(room_id).host();
        if host != Some(conn) {
            tracing::debug!(%conn, "startGame from non-host denied");
            self.send_to(
                conn,
                ServerMessage::StartGameDenied {
                    error: "Only the host can start the game".into(),
                },
            );
            return;
        }

        let Some(full_state) = usable_state(full_state) else {
            self.send_to(
                conn,
                ServerMessage::StartGameDenied {
                    error: "Invalid game state provided".into(),
                },
            );
            return;
        };

        tracing::info!(room_id = %room_id, "game started");
        self.broadcast(room_id, ServerMessage::GameStarted { full_state }, None);
    }

    fn relay_action(
        &mut self,
        conn: ConnId,
        room_id: &RoomId,
        action: cardrelay_protocol::ActionPayload,
    ) {
        let Some(kind) = action.kind().map(str::to_owned) else {
            tracing::debug!(%conn, "action without a kind, dropping");
            return;
        };
        let Some(player_seat) = self.registry.get_or_create(room_id).player_seat(conn)
        else {
            tracing::debug!(%conn, kind, "action from unseated connection, dropping");
            return;
        };

        tracing::debug!(%conn, seat = player_seat, kind, "relaying action");
        self.broadcast(
            room_id,
            ServerMessage::RemoteAction { player_seat, action },
            Some(conn),
        );
    }

    // -----------------------------------------------------------------
    // State sync
    // -----------------------------------------------------------------

    fn request_full_state(&mut self, conn: ConnId, room_id: &RoomId) {
        match self.registry.get_or_create(room_id).host() {
            Some(host) => {
                self.send_to(host, ServerMessage::RequestFullState { requester: conn })
            }
            None => {
                tracing::debug!(%conn, "full state requested but room has no host")
            }
        }
    }

    fn full_state_update(
        &mut self,
        conn: ConnId,
        room_id: &RoomId,
        to: Option<ConnId>,
        full_state: Option<serde_json::Value>,
        checksum: Option<String>,
    ) {
        let Some(full_state) = usable_state(full_state) else {
            tracing::debug!(%conn, "fullStateUpdate without a state, dropping");
            return;
        };

        let msg = ServerMessage::FullStateUpdate {
            full_state,
            checksum,
            from_host: true,
        };
        match to {
            Some(target) => self.send_to(target, msg),
            None => self.broadcast(room_id, msg, None),
        }
    }

    // -----------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------

    fn broadcast_seat_update(&mut self, room_id: &RoomId) {
        let room = self.registry.get_or_create(room_id);
        let msg = ServerMessage::SeatUpdate {
            seats: room.seat_status(),
            spectators: room.spectator_count(),
        };
        self.broadcast(room_id, msg, None);
    }

    /// Queues `msg` for every connection in the room, minus `except`.
    fn broadcast(&self, room_id: &RoomId, msg: ServerMessage, except: Option<ConnId>) {
        for (&conn, member_room) in &self.conn_rooms {
            if member_room != room_id || Some(conn) == except {
                continue;
            }
            if let Some(sender) = self.senders.get(&conn) {
                let _ = sender.send(msg.clone());
            }
        }
    }

    /// Queues `msg` for one connection. A vanished target is not an
    /// error; its disconnect is already in flight.
    fn send_to(&self, conn: ConnId, msg: ServerMessage) {
        match self.senders.get(&conn) {
            Some(sender) => {
                let _ = sender.send(msg);
            }
            None => tracing::debug!(%conn, "dropping message for unknown connection"),
        }
    }
}

/// Spawns the dispatcher actor and returns the event channel feeding it.
///
/// The task runs until every [`RelayEvent`] sender is dropped.
pub fn spawn_dispatcher(
    registry: RoomRegistry,
    default_room: RoomId,
    queue_depth: usize,
) -> mpsc::Sender<RelayEvent> {
    let (tx, mut rx) = mpsc::channel(queue_depth);
    let mut dispatcher = Dispatcher::new(registry, default_room);

    tokio::spawn(async move {
        tracing::info!("relay dispatcher started");
        while let Some(event) = rx.recv().await {
            dispatcher.handle_event(event);
        }
        tracing::info!("relay dispatcher stopped");
    });

    tx
}

/// Filters out states no client could load: absent, `null`, or a blank
/// scalar (`""`, `0`, `false`). A real state is always a JSON object.
fn usable_state(state: Option<serde_json::Value>) -> Option<serde_json::Value> {
    use serde_json::Value;
    state.filter(|state| match state {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    })
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
