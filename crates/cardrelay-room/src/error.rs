//! Error types for the room layer.

/// Errors from seat operations.
///
/// The display strings double as the user-facing denial text sent back
/// in `seatDenied`, so they are phrased for players, not logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SeatError {
    /// The requested seat number is outside 1–4.
    #[error("Invalid seat number")]
    InvalidSeat,

    /// The requested seat already has an occupant.
    #[error("Seat is already taken")]
    SeatTaken,

    /// The connection does not hold any seat.
    #[error("Player not in any seat")]
    NotSeated,
}
