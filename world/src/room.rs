use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::direction::Direction;

pub type RoomId = String;
pub type ZoneId = String;

/// One exit out of a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exit {
    pub direction: Direction,
    pub target: RoomId,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub hidden: bool,
}

/// A spawn configuration attached to a room, consumed by the respawn scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnConfig {
    pub template: String,
    pub count: u32,
    #[serde(default)]
    pub respawn_after: Option<String>,
}

/// A single location in the world graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub zone_id: ZoneId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub exits: Vec<Exit>,
    #[serde(default)]
    pub spawns: Vec<SpawnConfig>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl Room {
    pub fn exit(&self, direction: Direction) -> Option<&Exit> {
        self.exits.iter().find(|e| e.direction == direction)
    }
}
