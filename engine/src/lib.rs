//! Session/NPC registries, combat round handler, respawn scheduler, game
//! clock, zone ticks, persistence/admin contracts, and the per-session
//! orchestrator that ties the text-world server together.

pub mod clock;
pub mod combat_handler;
pub mod content;
pub mod error;
pub mod floor;
pub mod npc_registry;
pub mod orchestrator;
pub mod persistence;
pub mod respawn;
pub mod session_registry;
pub mod zone_tick;

pub use clock::{period_for_hour, GameClock, Period};
pub use combat_handler::{CombatEvent, CombatHandler};
pub use content::{
    load_npc_template_file, parse_npc_template, LootCurrency, LootItem, LootTable, NpcTemplate, TemplateCatalog,
};
pub use error::{ErrorKind, GameError, Quit};
pub use floor::{FloorItem, RoomFloor};
pub use npc_registry::{NpcInstance, NpcRegistry};
pub use orchestrator::{
    Command, Event, InboundCommands, InboundMessage, OutboundEvents, OutboundMessage, SessionOrchestrator,
};
pub use persistence::{
    Account, AccountAdmin, AccountRole, CharacterLoadout, CharacterSaver, InMemoryAccountAdmin, InMemoryCharacterSaver,
};
pub use respawn::{RespawnScheduler, RoomSpawnConfig};
pub use session_registry::{BridgeEntity, Session, SessionRegistry};
pub use zone_tick::{IdleBehaviorDriver, ZoneCallback, ZoneTickManager};
