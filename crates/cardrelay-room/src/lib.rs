//! Room and seat state for Cardrelay.
//!
//! A [`Room`] is pure in-memory state — a four-seat table, per-seat
//! display names, a host pointer, and a spectator set — with mutation
//! operations and a deterministic status projection. No I/O, no async;
//! the relay dispatcher drives it and decides what to send where.
//!
//! # Key types
//!
//! - [`Room`] — the seat/host/spectator state machine
//! - [`RoomRegistry`] — lazily creates rooms by id, removes empty ones
//! - [`SeatGrant`] — the result of a successful seat request
//! - [`SeatError`] — seat-request denials and misses

mod error;
mod registry;
mod room;

pub use error::SeatError;
pub use registry::RoomRegistry;
pub use room::{Room, SeatGrant, SEAT_COUNT};
