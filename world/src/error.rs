use thiserror::Error;

/// Errors raised while loading or navigating the world graph.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("duplicate zone id: {0}")]
    DuplicateZone(String),

    #[error("duplicate room id across zones: {0}")]
    DuplicateRoom(String),

    #[error("zone {zone} start room {room} does not exist")]
    UnknownStartRoom { zone: String, room: String },

    #[error("exit from room {from} targets unknown room {target}")]
    UnknownExitTarget { from: String, target: String },

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("no exit to the {0:?} from this room")]
    NoExit(crate::Direction),

    #[error("exit to the {0:?} is locked")]
    Locked(crate::Direction),

    #[error("exit target does not resolve: {0}")]
    UnknownTarget(String),

    #[error("failed to parse zone file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read zone file: {0}")]
    Io(#[from] std::io::Error),
}
