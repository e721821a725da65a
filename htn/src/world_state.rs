use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which side of a fight a combatant is fighting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatantKind {
    Player,
    Npc,
}

/// A read-only fact about one combatant, as seen by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantFact {
    pub uid: String,
    pub name: String,
    pub kind: CombatantKind,
    pub current_hp: i32,
    pub dead: bool,
}

/// A read-only snapshot handed to the planner: self facts, room facts, and
/// every combatant currently known (empty outside of combat).
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    pub self_uid: String,
    pub room_facts: HashMap<String, String>,
    pub combatants: Vec<CombatantFact>,
}

impl WorldState {
    pub fn new(self_uid: impl Into<String>) -> Self {
        Self {
            self_uid: self_uid.into(),
            room_facts: HashMap::new(),
            combatants: Vec::new(),
        }
    }

    pub fn with_combatants(mut self, combatants: Vec<CombatantFact>) -> Self {
        self.combatants = combatants;
        self
    }

    pub fn with_room_fact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.room_facts.insert(key.into(), value.into());
        self
    }

    fn fact(&self, uid: &str) -> Option<&CombatantFact> {
        self.combatants.iter().find(|c| c.uid == uid)
    }

    fn self_fact(&self) -> Option<&CombatantFact> {
        self.fact(&self.self_uid)
    }

    /// Combatants of a different kind than `uid`, excluding the dead.
    pub fn enemies_of(&self, uid: &str) -> Vec<&CombatantFact> {
        let Some(me) = self.fact(uid) else {
            return Vec::new();
        };
        self.combatants
            .iter()
            .filter(|c| c.kind != me.kind && !c.dead)
            .collect()
    }

    /// Combatants of the same kind as `uid`, excluding self and the dead.
    pub fn allies_of(&self, uid: &str) -> Vec<&CombatantFact> {
        let Some(me) = self.fact(uid) else {
            return Vec::new();
        };
        self.combatants
            .iter()
            .filter(|c| c.kind == me.kind && c.uid != uid && !c.dead)
            .collect()
    }

    /// The first enemy in list order (no geometry; list order is the tie-break).
    pub fn nearest_enemy(&self, uid: &str) -> Option<&CombatantFact> {
        self.enemies_of(uid).into_iter().next()
    }

    /// The enemy with the lowest current HP, ties broken by list order.
    pub fn weakest_enemy(&self, uid: &str) -> Option<&CombatantFact> {
        self.enemies_of(uid)
            .into_iter()
            .min_by_key(|c| c.current_hp)
    }

    pub fn has_living_enemies(&self, uid: &str) -> bool {
        !self.enemies_of(uid).is_empty()
    }

    /// Resolve a target token against this state's self-uid.
    ///
    /// `nearest_enemy` / `weakest_enemy` return the matching enemy's name, or
    /// an empty string when no living enemy exists; `self` returns the
    /// self-combatant's name (falling back to the raw uid if this state
    /// carries no fact for self); any other token is returned verbatim as a
    /// literal name.
    pub fn resolve_target(&self, token: &str) -> String {
        match token {
            "nearest_enemy" => self
                .nearest_enemy(&self.self_uid)
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            "weakest_enemy" => self
                .weakest_enemy(&self.self_uid)
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            "self" => self
                .self_fact()
                .map(|c| c.name.clone())
                .unwrap_or_else(|| self.self_uid.clone()),
            literal => literal.to_string(),
        }
    }
}
