use std::collections::HashMap;

pub type ConditionId = String;

/// How an active condition expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duration {
    Permanent,
    Rounds(u32),
    UntilSave,
}

/// Content-defined rules for one condition: how much it penalizes AC and
/// attack rolls per stack, how many stacks it can carry, and which action
/// names it forbids outright.
#[derive(Debug, Clone)]
pub struct ConditionDef {
    pub id: ConditionId,
    pub max_stacks: u32,
    pub ac_penalty_per_stack: i32,
    pub attack_penalty_per_stack: i32,
    pub restrict_actions: Vec<String>,
}

impl ConditionDef {
    pub fn restricts(&self, action_name: &str) -> bool {
        self.restrict_actions.iter().any(|a| a == action_name)
    }
}

/// One condition currently applied to a combatant.
#[derive(Debug, Clone)]
pub struct ActiveCondition {
    pub id: ConditionId,
    pub stacks: u32,
    pub duration: Duration,
}

impl ActiveCondition {
    pub fn ac_penalty(&self, def: &ConditionDef) -> i32 {
        def.ac_penalty_per_stack * self.stacks as i32
    }

    pub fn attack_penalty(&self, def: &ConditionDef) -> i32 {
        def.attack_penalty_per_stack * self.stacks as i32
    }
}

/// Pluggable condition catalog. The rule content itself (which conditions
/// exist and how harsh they are) is plugged in; the engine only needs
/// lookup.
pub trait ConditionRegistry {
    fn get(&self, id: &str) -> Option<&ConditionDef>;
}

#[derive(Default)]
pub struct InMemoryConditionRegistry {
    defs: HashMap<ConditionId, ConditionDef>,
}

impl InMemoryConditionRegistry {
    pub fn new() -> Self {
        Self { defs: HashMap::new() }
    }

    pub fn insert(&mut self, def: ConditionDef) {
        self.defs.insert(def.id.clone(), def);
    }
}

impl ConditionRegistry for InMemoryConditionRegistry {
    fn get(&self, id: &str) -> Option<&ConditionDef> {
        self.defs.get(id)
    }
}

/// Apply or stack a condition onto a combatant's active-condition map.
/// Returns `false` when the condition id is unregistered.
pub fn apply_condition(
    active: &mut HashMap<ConditionId, ActiveCondition>,
    registry: &dyn ConditionRegistry,
    condition_id: &str,
    stacks: u32,
    duration: Duration,
) -> bool {
    let Some(def) = registry.get(condition_id) else {
        return false;
    };
    let capped = stacks.min(def.max_stacks);
    active
        .entry(condition_id.to_string())
        .and_modify(|existing| {
            existing.stacks = (existing.stacks + capped).min(def.max_stacks);
            existing.duration = duration;
        })
        .or_insert(ActiveCondition {
            id: condition_id.to_string(),
            stacks: capped,
            duration,
        });
    true
}

/// Advance round-scoped conditions by one tick, dropping any whose rounds
/// have run out. `permanent` and `until_save` conditions are untouched here.
pub fn tick_round_conditions(active: &mut HashMap<ConditionId, ActiveCondition>) {
    active.retain(|_, cond| match &mut cond.duration {
        Duration::Rounds(remaining) => {
            if *remaining == 0 {
                false
            } else {
                *remaining -= 1;
                *remaining > 0 || matches!(cond.duration, Duration::Permanent)
            }
        }
        _ => true,
    });
}

/// Clear every `until_save` condition after a successful save.
pub fn clear_on_save(active: &mut HashMap<ConditionId, ActiveCondition>) {
    active.retain(|_, cond| cond.duration != Duration::UntilSave);
}
