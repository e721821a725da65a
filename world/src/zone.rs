use std::collections::HashMap;

use crate::room::{Room, RoomId, ZoneId};

/// An immutable-after-load collection of rooms sharing one id namespace.
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub description: String,
    pub start_room: RoomId,
    pub rooms: HashMap<RoomId, Room>,
}

impl Zone {
    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }
}
