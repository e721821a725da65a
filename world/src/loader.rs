use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::WorldError;
use crate::room::{Exit, Room, SpawnConfig};
use crate::zone::Zone;

#[derive(Debug, Deserialize)]
struct ZoneFile {
    zone: ZoneDef,
}

#[derive(Debug, Deserialize)]
struct ZoneDef {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    start_room: String,
    #[serde(default)]
    #[allow(dead_code)]
    script_dir: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    script_instruction_limit: Option<u32>,
    #[serde(default)]
    rooms: Vec<RoomDef>,
}

#[derive(Debug, Deserialize)]
struct RoomDef {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    exits: Vec<Exit>,
    #[serde(default)]
    properties: HashMap<String, String>,
    #[serde(default)]
    spawns: Vec<SpawnConfig>,
}

/// Parse a single zone file's contents into a validated `Zone`.
///
/// Validation performed here is local to the zone (rooms map is internally
/// consistent); cross-zone invariants (duplicate ids, exit resolution) are
/// enforced by [`crate::Manager::new`] once every zone has been parsed.
pub fn parse_zone(toml_source: &str) -> Result<Zone, WorldError> {
    let file: ZoneFile = toml::from_str(toml_source)?;
    let zone_id = file.zone.id;
    let rooms = file
        .zone
        .rooms
        .into_iter()
        .map(|r| {
            let room = Room {
                id: r.id.clone(),
                zone_id: zone_id.clone(),
                title: r.title,
                description: r.description,
                exits: r.exits,
                spawns: r.spawns,
                properties: r.properties,
            };
            (r.id, room)
        })
        .collect::<HashMap<_, _>>();

    Ok(Zone {
        id: zone_id,
        name: file.zone.name,
        description: file.zone.description,
        start_room: file.zone.start_room,
        rooms,
    })
}

/// Parse a zone file from disk. `Io` wraps read failures, `Parse` wraps TOML
/// schema failures, matching the `thiserror`-derived `From` conversions on
/// [`WorldError`].
pub fn load_zone_file(path: impl AsRef<Path>) -> Result<Zone, WorldError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    let zone = parse_zone(&source)?;
    info!(path = %path.display(), zone = %zone.id, "loaded zone file");
    Ok(zone)
}
