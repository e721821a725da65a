use dashmap::DashMap;

/// One stack of an item sitting on a room's floor, left behind by a loot
/// drop or a deliberate drop command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorItem {
    pub item: String,
    pub qty: u32,
}

/// Concurrent per-room item floor. Populated by combat loot drops, drained
/// by pickup commands, analogous in shape to the NPC and session registries.
#[derive(Default)]
pub struct RoomFloor {
    rooms: DashMap<String, Vec<FloorItem>>,
}

impl RoomFloor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_items(&self, room_id: &str, items: Vec<FloorItem>) {
        if items.is_empty() {
            return;
        }
        self.rooms.entry(room_id.to_string()).or_default().extend(items);
    }

    pub fn items_in_room(&self, room_id: &str) -> Vec<FloorItem> {
        self.rooms.get(room_id).map(|v| v.clone()).unwrap_or_default()
    }

    /// Removes and returns every item on a room's floor, e.g. for a
    /// "take all" pickup command.
    pub fn take_all(&self, room_id: &str) -> Vec<FloorItem> {
        self.rooms.remove(room_id).map(|(_, v)| v).unwrap_or_default()
    }
}
