//! Wire protocol for Cardrelay.
//!
//! This crate defines the messages that clients and the relay exchange:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`ActionPayload`],
//!   [`SeatInfo`], [`RoomId`]) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! The protocol layer sits between transport (raw bytes) and the relay
//! dispatcher (room state). It doesn't know about connections or rooms —
//! it only knows how to serialize and deserialize messages.

mod codec;
mod error;
mod types;

pub use cardrelay_transport::ConnId;
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ActionPayload, ClientMessage, GameAction, RoomId, SeatInfo,
    ServerMessage,
};
