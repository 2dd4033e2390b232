//! Room registry: lazily creates rooms by id and removes empty ones.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use cardrelay_protocol::RoomId;

use crate::Room;

/// Owns every live room, keyed by identifier.
///
/// This is an explicit instance injected into the dispatcher — there is
/// no process-global table. The current deployment funnels everything
/// into one default room, but the registry supports any number of
/// concurrently live rooms with independent seat/host/spectator state.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { rooms: HashMap::new() }
    }

    /// Returns the room with the given id, creating it on first access.
    pub fn get_or_create(&mut self, id: &RoomId) -> &mut Room {
        match self.rooms.entry(id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::info!(room_id = %id, "room created");
                entry.insert(Room::new(id.clone()))
            }
        }
    }

    /// Returns the room with the given id, if it exists.
    pub fn get_mut(&mut self, id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    /// Removes the room with the given id.
    ///
    /// Called by the dispatcher after a seat-vacating event leaves the
    /// room empty.
    pub fn remove(&mut self, id: &RoomId) -> Option<Room> {
        let removed = self.rooms.remove(id);
        if removed.is_some() {
            tracing::info!(room_id = %id, "removed empty room");
        }
        removed
    }

    /// `true` if a room with the given id exists.
    pub fn contains(&self, id: &RoomId) -> bool {
        self.rooms.contains_key(id)
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// `true` if no rooms are live.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
