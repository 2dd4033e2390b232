//! The four-seat room: seat assignment, host election, spectators.

use std::collections::{BTreeMap, HashSet};

use cardrelay_protocol::{ConnId, RoomId, SeatInfo};

use crate::SeatError;

/// Number of seats at the table. Seat numbers are 1-based on the wire.
pub const SEAT_COUNT: usize = 4;

/// The result of a successful seat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatGrant {
    /// The seat number that was assigned.
    pub seat: u8,
    /// Whether the requester is the room host after the assignment.
    pub is_host: bool,
    /// The resolved display name (given name, or the generated default).
    pub player_name: String,
}

/// One game table: four seats, a host, and a spectator set.
///
/// Invariants maintained by the mutation operations:
/// - a connection occupies at most one seat;
/// - `host` is `None` iff every seat is vacant, otherwise it is the
///   connection in some occupied seat;
/// - a seat has a display name iff it is occupied.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    seats: [Option<ConnId>; SEAT_COUNT],
    seat_names: [Option<String>; SEAT_COUNT],
    host: Option<ConnId>,
    spectators: HashSet<ConnId>,
}

impl Room {
    /// Creates an empty room.
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            seats: Default::default(),
            seat_names: Default::default(),
            host: None,
            spectators: HashSet::new(),
        }
    }

    /// The room's identifier.
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// The current host connection, if any seat is occupied.
    pub fn host(&self) -> Option<ConnId> {
        self.host
    }

    /// Assigns `conn` to `seat` (1–4).
    ///
    /// If the connection already holds a different seat, that seat is
    /// vacated first as part of the same operation — there is never an
    /// intermediate state with one connection in two seats. The first
    /// occupant of an empty room becomes host.
    pub fn request_seat(
        &mut self,
        conn: ConnId,
        seat: u8,
        player_name: Option<String>,
    ) -> Result<SeatGrant, SeatError> {
        if seat == 0 || seat as usize > SEAT_COUNT {
            return Err(SeatError::InvalidSeat);
        }
        let idx = (seat - 1) as usize;
        if self.seats[idx].is_some() {
            return Err(SeatError::SeatTaken);
        }

        // Vacate any previously held seat (including host handover).
        let _ = self.leave_seat(conn);

        self.seats[idx] = Some(conn);
        let player_name = player_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_name(seat));
        self.seat_names[idx] = Some(player_name.clone());

        if self.host.is_none() {
            self.host = Some(conn);
            tracing::info!(room_id = %self.id, %conn, "connection is now the host");
        }

        tracing::info!(
            room_id = %self.id,
            %conn,
            seat,
            name = %player_name,
            "seat assigned"
        );
        Ok(SeatGrant {
            seat,
            is_host: self.host == Some(conn),
            player_name,
        })
    }

    /// Vacates the seat held by `conn`, returning its number.
    ///
    /// If the departing connection was host, the host moves to the
    /// lowest-numbered remaining occupied seat, or is cleared when none
    /// remain.
    pub fn leave_seat(&mut self, conn: ConnId) -> Result<u8, SeatError> {
        let seat = self.player_seat(conn).ok_or(SeatError::NotSeated)?;
        let idx = (seat - 1) as usize;
        self.seats[idx] = None;
        self.seat_names[idx] = None;
        tracing::info!(room_id = %self.id, %conn, seat, "seat vacated");

        if self.host == Some(conn) {
            self.host = self.seats.iter().flatten().next().copied();
            match self.host {
                Some(new_host) => tracing::info!(
                    room_id = %self.id, %new_host, "host reassigned"
                ),
                None => tracing::info!(room_id = %self.id, "room has no host"),
            }
        }

        Ok(seat)
    }

    /// The seat number held by `conn`, if any.
    pub fn player_seat(&self, conn: ConnId) -> Option<u8> {
        self.seats
            .iter()
            .position(|occupant| *occupant == Some(conn))
            .map(|idx| (idx + 1) as u8)
    }

    /// Pure projection of the current seat table for broadcasting.
    ///
    /// Vacant seats report the generated `"Player <s>"` default name so
    /// clients always have something to render.
    pub fn seat_status(&self) -> BTreeMap<u8, SeatInfo> {
        (1..=SEAT_COUNT as u8)
            .map(|seat| {
                let idx = (seat - 1) as usize;
                let occupant = self.seats[idx];
                let info = SeatInfo {
                    occupied: occupant.is_some(),
                    is_host: occupant.is_some() && occupant == self.host,
                    player_name: self.seat_names[idx]
                        .clone()
                        .unwrap_or_else(|| default_name(seat)),
                };
                (seat, info)
            })
            .collect()
    }

    /// Adds `conn` to the spectator set. Idempotent.
    pub fn spectator_join(&mut self, conn: ConnId) {
        self.spectators.insert(conn);
    }

    /// Removes `conn` from the spectator set. Idempotent.
    pub fn spectator_leave(&mut self, conn: ConnId) {
        self.spectators.remove(&conn);
    }

    /// Number of spectators currently registered.
    pub fn spectator_count(&self) -> usize {
        self.spectators.len()
    }

    /// `true` iff all four seats are vacant. Spectators don't count —
    /// a spectator-only room is considered empty.
    pub fn is_empty(&self) -> bool {
        self.seats.iter().all(Option::is_none)
    }
}

fn default_name(seat: u8) -> String {
    format!("Player {seat}")
}
