use std::collections::HashMap;

use thiserror::Error;

use crate::world_state::WorldState;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("precondition hook {0:?} failed to evaluate")]
    Failed(String),
}

/// Capability the planner calls to decide whether a method's precondition
/// holds. The reference implementation binds this to an embedded scripting
/// engine; the planner itself is oblivious to how a hook is implemented, so
/// this crate never depends on one.
pub trait PreconditionHook {
    fn evaluate(&self, zone_id: &str, hook_name: &str, state: &WorldState) -> Result<bool, HookError>;
}

type Predicate = fn(&WorldState) -> bool;

/// The non-scripting alternative called out in the design notes: a static
/// map from hook name to predicate function, ignoring `zone_id` since every
/// predicate here is evaluated purely from the world-state snapshot.
#[derive(Default)]
pub struct StaticHookTable {
    predicates: HashMap<&'static str, Predicate>,
}

impl StaticHookTable {
    pub fn new() -> Self {
        Self {
            predicates: HashMap::new(),
        }
    }

    pub fn register(mut self, name: &'static str, predicate: Predicate) -> Self {
        self.predicates.insert(name, predicate);
        self
    }

    /// A table pre-loaded with the predicates the bundled sample domains use.
    pub fn with_builtin_predicates() -> Self {
        Self::new()
            .register("has_enemy", |state| state.has_living_enemies(&state.self_uid))
            .register("no_enemy", |state| !state.has_living_enemies(&state.self_uid))
    }
}

impl PreconditionHook for StaticHookTable {
    fn evaluate(&self, _zone_id: &str, hook_name: &str, state: &WorldState) -> Result<bool, HookError> {
        match self.predicates.get(hook_name) {
            Some(predicate) => Ok(predicate(state)),
            None => Err(HookError::Failed(hook_name.to_string())),
        }
    }
}
