use std::collections::HashMap;

use tracing::{debug, info};

use crate::direction::Direction;
use crate::error::WorldError;
use crate::room::{Room, RoomId, ZoneId};
use crate::zone::Zone;

/// Global, immutable-after-load index of every room across every zone.
///
/// Construction validates the invariants from the data model: duplicate zone
/// ids are fatal, duplicate room ids across zones are fatal, and every exit
/// target must resolve against the global index. Once built, lookups are
/// constant time and the manager is safely shared behind an `Arc` without
/// any internal locking.
pub struct Manager {
    zones: HashMap<ZoneId, Zone>,
    rooms: HashMap<RoomId, ZoneId>,
}

impl Manager {
    /// Build the global index from a set of validated zones, enforcing
    /// cross-zone invariants that a single zone cannot check on its own.
    pub fn new(zones: Vec<Zone>) -> Result<Self, WorldError> {
        let mut zone_map = HashMap::with_capacity(zones.len());
        let mut room_owner = HashMap::new();

        for zone in zones {
            if zone_map.contains_key(&zone.id) {
                return Err(WorldError::DuplicateZone(zone.id));
            }
            for room_id in zone.rooms.keys() {
                if let Some(existing_zone) = room_owner.insert(room_id.clone(), zone.id.clone()) {
                    let _ = existing_zone;
                    return Err(WorldError::DuplicateRoom(room_id.clone()));
                }
            }
            if !zone.rooms.contains_key(&zone.start_room) {
                return Err(WorldError::UnknownStartRoom {
                    zone: zone.id.clone(),
                    room: zone.start_room.clone(),
                });
            }
            zone_map.insert(zone.id.clone(), zone);
        }

        for zone in zone_map.values() {
            for room in zone.rooms.values() {
                for exit in &room.exits {
                    if !room_owner.contains_key(&exit.target) {
                        return Err(WorldError::UnknownExitTarget {
                            from: room.id.clone(),
                            target: exit.target.clone(),
                        });
                    }
                }
            }
        }

        info!(zones = zone_map.len(), rooms = room_owner.len(), "world graph validated");
        Ok(Self {
            zones: zone_map,
            rooms: room_owner,
        })
    }

    /// Constant-time lookup of a room by id, regardless of which zone owns it.
    pub fn get_room(&self, id: &str) -> Result<&Room, WorldError> {
        let zone_id = self
            .rooms
            .get(id)
            .ok_or_else(|| WorldError::RoomNotFound(id.to_string()))?;
        Ok(self
            .zones
            .get(zone_id)
            .and_then(|zone| zone.room(id))
            .expect("room index and zone map must agree"))
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn zone_of_room(&self, room_id: &str) -> Option<&str> {
        self.rooms.get(room_id).map(String::as_str)
    }

    pub fn zone_ids(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    /// Resolve the exit of `from_room_id` in `direction`.
    ///
    /// Cross-zone exits are permitted: validation already proved at
    /// construction time that every exit target resolves, so navigation
    /// itself can never fail with `UnknownTarget` in practice — it remains
    /// part of the error type for defense against a manager built by some
    /// other path that skipped validation.
    pub fn navigate(&self, from_room_id: &str, direction: Direction) -> Result<&Room, WorldError> {
        let from = self.get_room(from_room_id)?;
        let exit = from.exit(direction).ok_or(WorldError::NoExit(direction))?;
        if exit.locked {
            return Err(WorldError::Locked(direction));
        }
        debug!(from = from_room_id, %exit.target, ?direction, "navigate");
        self.get_room(&exit.target)
            .map_err(|_| WorldError::UnknownTarget(exit.target.clone()))
    }
}
