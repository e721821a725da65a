mod action;
mod attack;
mod combat;
mod combatant;
mod condition;
mod dice;
mod engine;
mod error;
mod loot;

pub use action::{ActionKind, ActionQueue, ActionQueues, QueuedAction};
pub use attack::{resolve_attack, AttackOutcome, AttackResolution};
pub use combat::Combat;
pub use combatant::{Combatant, CombatantKind};
pub use condition::{
    apply_condition, clear_on_save, tick_round_conditions, ActiveCondition, ConditionDef,
    ConditionId, ConditionRegistry, Duration, InMemoryConditionRegistry,
};
pub use dice::{DiceRoller, ScriptedDiceRoller, ThreadRngDiceRoller};
pub use engine::CombatEngine;
pub use error::CombatError;
pub use loot::{DiceLootRoller, LootRoller};
