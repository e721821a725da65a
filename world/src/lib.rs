//! World graph: immutable-after-load zones, rooms, and exits, plus global
//! navigation across zone boundaries.

mod direction;
mod error;
mod loader;
mod manager;
mod room;
mod zone;

pub use direction::Direction;
pub use error::WorldError;
pub use loader::{load_zone_file, parse_zone};
pub use manager::Manager;
pub use room::{Exit, Room, RoomId, SpawnConfig, ZoneId};
pub use zone::Zone;
