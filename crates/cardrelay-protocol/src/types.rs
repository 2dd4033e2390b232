//! Core protocol types for Cardrelay's wire format.
//!
//! Every message is an internally tagged JSON object — the `"type"` field
//! names the event, the remaining fields are its payload, all camelCase.
//! Because the outer message owns the `"type"` key, the game-action
//! envelope nests under an `action` field instead of being flattened:
//!
//! ```text
//! {"type":"action","action":{"type":"discard","cardId":"7H"}}
//! {"type":"remoteAction","playerSeat":1,"action":{"type":"discard","cardId":"7H"}}
//! ```
//!
//! Game payloads (`fullState`, cards, checksums) are opaque to the relay
//! and modeled as `serde_json::Value` — the host client is the only party
//! that interprets them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use cardrelay_transport::ConnId;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A room identifier.
///
/// Newtype over `String` — the deployment default is `"game-room"`, but
/// the registry is keyed by this type so many rooms can coexist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Seat status projection
// ---------------------------------------------------------------------------

/// One entry of the per-seat status projection broadcast in `seatUpdate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatInfo {
    /// Whether the seat currently has an occupant.
    pub occupied: bool,
    /// Whether the occupant is the room host.
    pub is_host: bool,
    /// The occupant's display name, or the generated `"Player <s>"`
    /// default for vacant seats.
    pub player_name: String,
}

// ---------------------------------------------------------------------------
// Game actions — the closed relay table
// ---------------------------------------------------------------------------

/// The closed set of recognized game-action shapes.
///
/// For these kinds the relay forwards exactly the fields listed here and
/// nothing else. Field values stay opaque (`Value`) — the relay never
/// checks game legality. Kinds outside this table travel through
/// [`ActionPayload::Other`] verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameAction {
    /// A new meld laid on the table.
    #[serde(rename_all = "camelCase")]
    MeldCreate { kind: Value, cards: Value },
    /// Cards added to an existing meld.
    #[serde(rename_all = "camelCase")]
    MeldExtend { meld_id: Value, cards: Value },
    /// A card discarded to the pile.
    #[serde(rename_all = "camelCase")]
    Discard { card_id: Value },
    /// The biribaki (reserve pack) handed to a team.
    BiribakiGiven { team: Value },
    /// Dev tool: replace a hand with a seven-card run.
    #[serde(rename_all = "camelCase")]
    DevSevenCardRun { new_hand: Value },
    /// Preview of a biribaki pickup.
    #[serde(rename_all = "camelCase")]
    BiribakiPreview { player_id: Value, team: Value },
    /// Dev tools panel opened by a player.
    #[serde(rename_all = "camelCase")]
    DevToolsOpened { player_id: Value },
    /// A player skipping their turn.
    #[serde(rename_all = "camelCase")]
    SkipTurn { player_id: Value },
}

impl GameAction {
    /// The wire tag for this action kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MeldCreate { .. } => "meldCreate",
            Self::MeldExtend { .. } => "meldExtend",
            Self::Discard { .. } => "discard",
            Self::BiribakiGiven { .. } => "biribakiGiven",
            Self::DevSevenCardRun { .. } => "devSevenCardRun",
            Self::BiribakiPreview { .. } => "biribakiPreview",
            Self::DevToolsOpened { .. } => "devToolsOpened",
            Self::SkipTurn { .. } => "skipTurn",
        }
    }
}

/// A game-action envelope: a recognized shape, or a passthrough payload
/// for any other kind.
///
/// Untagged — decoding tries the closed table first and falls back to
/// capturing the whole object, so unrecognized kinds are relayed with
/// every field intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionPayload {
    /// One of the recognized action shapes.
    Known(GameAction),
    /// Anything else — relayed verbatim, including its `type` field.
    Other(Map<String, Value>),
}

impl ActionPayload {
    /// Returns the action kind, if a non-empty one is present.
    ///
    /// Passthrough payloads without a usable `type` string yield `None`;
    /// the dispatcher drops those silently.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Known(action) => Some(action.kind()),
            Self::Other(map) => map
                .get("type")
                .and_then(Value::as_str)
                .filter(|kind| !kind.is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Messages a client sends to the relay.
///
/// Optional fields use `#[serde(default)]` so their absence is a semantic
/// condition the dispatcher handles (denial or silent drop), not a decode
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Claim a seat (1–4), optionally with a display name.
    #[serde(rename_all = "camelCase")]
    RequestSeat {
        seat: u8,
        #[serde(default)]
        player_name: Option<String>,
    },

    /// Vacate the currently held seat.
    LeaveSeat,

    /// Join the spectator set.
    SpectateJoin,

    /// Leave the spectator set.
    SpectateLeave,

    /// Host-only: start the game with the given full state.
    #[serde(rename_all = "camelCase")]
    StartGame {
        #[serde(default)]
        full_state: Option<Value>,
    },

    /// A game action to relay to the other players.
    Action { action: ActionPayload },

    /// A state checksum to rebroadcast to the room.
    StateChecksum {
        checksum: String,
        #[serde(default)]
        ts: Option<u64>,
    },

    /// Ask the host for a full state snapshot.
    RequestFullState,

    /// A full state snapshot, targeted or room-wide.
    #[serde(rename_all = "camelCase")]
    FullStateUpdate {
        #[serde(default)]
        to: Option<ConnId>,
        #[serde(default)]
        full_state: Option<Value>,
        #[serde(default)]
        checksum: Option<String>,
    },

    /// A chat message.
    #[serde(rename_all = "camelCase")]
    Chat { player_id: Value, message: String },

    /// A typing indicator.
    #[serde(rename_all = "camelCase")]
    Typing { player_id: Value, is_typing: bool },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Messages the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Per-seat status plus the spectator count.
    SeatUpdate {
        seats: BTreeMap<u8, SeatInfo>,
        spectators: usize,
    },

    /// A seat request was granted (unicast to the requester).
    #[serde(rename_all = "camelCase")]
    SeatGranted {
        seat: u8,
        is_host: bool,
        player_name: String,
    },

    /// A seat request was denied (unicast to the requester).
    SeatDenied { error: String },

    /// Spectator count changed.
    SpectatorsUpdate { spectators: usize },

    /// The host started the game; carries the initial full state.
    #[serde(rename_all = "camelCase")]
    GameStarted { full_state: Value },

    /// A `startGame` request was denied (unicast to the requester).
    StartGameDenied { error: String },

    /// A relayed game action, stamped with the sender's seat.
    #[serde(rename_all = "camelCase")]
    RemoteAction { player_seat: u8, action: ActionPayload },

    /// A relayed state checksum, stamped with a timestamp.
    StateChecksum { checksum: String, ts: u64 },

    /// Forwarded to the host: some connection wants the full state.
    RequestFullState { requester: ConnId },

    /// A relayed full state snapshot.
    #[serde(rename_all = "camelCase")]
    FullStateUpdate {
        full_state: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum: Option<String>,
        from_host: bool,
    },

    /// A relayed chat message.
    #[serde(rename_all = "camelCase")]
    ChatMessage { player_id: Value, message: String },

    /// A relayed typing indicator.
    #[serde(rename_all = "camelCase")]
    Typing { player_id: Value, is_typing: bool },
}

// =========================================================================
// Tests
// =========================================================================
