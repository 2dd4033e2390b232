//! Cardrelay — a host-authoritative session relay for a four-seat card
//! game.
//!
//! The server holds no game rules. It owns the social state of a table
//! (who sits where, who is host, who watches) and relays everything else
//! between clients: opaque game actions stamped with the sender's seat,
//! state checksums, and full-state snapshots requested from the host.
//!
//! Layering, bottom up:
//!
//! - `cardrelay-transport` — WebSocket accept/send/recv behind traits
//! - `cardrelay-protocol` — the JSON wire format and codec
//! - `cardrelay-room` — seats, host election, spectators
//! - `cardrelay` (this crate) — the dispatcher actor and the server
//!
//! All room state lives inside a single dispatcher task; connection
//! handlers feed it events over a channel, so message effects are
//! applied in arrival order without locks.

mod dispatch;
mod error;
mod handler;
mod server;

pub use dispatch::{ClientSender, Dispatcher, RelayEvent};
pub use error::RelayError;
pub use server::{RelayServer, RelayServerBuilder, DEFAULT_ROOM};

/// Commonly used types, re-exported for binaries and tests.
pub mod prelude {
    pub use crate::{RelayError, RelayServer, RelayServerBuilder, DEFAULT_ROOM};
    pub use cardrelay_protocol::{
        ActionPayload, ClientMessage, Codec, ConnId, GameAction, JsonCodec,
        RoomId, SeatInfo, ServerMessage,
    };
    pub use cardrelay_room::{Room, RoomRegistry, SeatError, SEAT_COUNT};
}
