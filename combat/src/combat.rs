use std::collections::HashMap;

use tracing::debug;

use crate::action::{ActionQueue, ActionQueues};
use crate::combatant::Combatant;
use crate::condition::{ActiveCondition, ConditionId};
use crate::dice::DiceRoller;

/// One combatant's rolled initiative, kept around for tie-break bookkeeping
/// and for narrating the round's initiative order.
#[derive(Debug, Clone, Copy)]
struct Initiative {
    roll_plus_dex: i32,
    dex_mod: i32,
    insertion_order: usize,
}

/// The live state of one room's fight: the initiative-ordered combatants,
/// whose turn it is, each combatant's per-round action queue, and active
/// conditions. Combatants here are owned copies the handler reads back into
/// the NPC/session registries; the combat engine itself never frees the
/// underlying session or NPC records.
pub struct Combat {
    pub room_id: String,
    pub combatants: Vec<Combatant>,
    pub current_turn: usize,
    pub action_queues: ActionQueues,
    pub conditions: HashMap<String, HashMap<ConditionId, ActiveCondition>>,
}

impl Combat {
    /// Roll initiative and build a fresh combat record. Higher
    /// `d20 + dex_mod` goes first; ties break by `dex_mod`, then by the
    /// order combatants were passed in.
    pub fn start(
        room_id: impl Into<String>,
        combatants: Vec<Combatant>,
        ap_budget: u32,
        dice: &mut dyn DiceRoller,
    ) -> Self {
        let room_id = room_id.into();
        let rolls: Vec<Initiative> = combatants
            .iter()
            .enumerate()
            .map(|(i, c)| Initiative {
                roll_plus_dex: dice.roll_d20() as i32 + c.dex_mod,
                dex_mod: c.dex_mod,
                insertion_order: i,
            })
            .collect();

        let mut order: Vec<usize> = (0..combatants.len()).collect();
        order.sort_by(|&a, &b| {
            rolls[b]
                .roll_plus_dex
                .cmp(&rolls[a].roll_plus_dex)
                .then(rolls[b].dex_mod.cmp(&rolls[a].dex_mod))
                .then(rolls[a].insertion_order.cmp(&rolls[b].insertion_order))
        });

        let ordered: Vec<Combatant> = order.iter().map(|&idx| combatants[idx].clone()).collect();

        let mut action_queues = ActionQueues::new();
        for c in &ordered {
            action_queues.insert(c.id.clone(), ActionQueue::new(ap_budget));
        }

        debug!(room = %room_id, combatants = ordered.len(), "combat started");
        Self {
            room_id,
            combatants: ordered,
            current_turn: 0,
            action_queues,
            conditions: HashMap::new(),
        }
    }

    pub fn combatant(&self, id: &str) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    pub fn combatant_mut(&mut self, id: &str) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    pub fn current_combatant(&self) -> Option<&Combatant> {
        self.combatants.get(self.current_turn)
    }

    /// Advance cyclically, skipping dead combatants. Returns `None` (leaving
    /// the cursor unchanged) if nobody is alive.
    pub fn advance_turn(&mut self) -> Option<&Combatant> {
        if self.combatants.iter().all(|c| c.dead) {
            return None;
        }
        let n = self.combatants.len();
        for step in 1..=n {
            let next = (self.current_turn + step) % n;
            if !self.combatants[next].dead {
                self.current_turn = next;
                return self.combatants.get(self.current_turn);
            }
        }
        None
    }

    /// True iff at least one player and one NPC are still alive.
    pub fn is_active(&self) -> bool {
        let players_alive = self
            .combatants
            .iter()
            .any(|c| matches!(c.kind, crate::combatant::CombatantKind::Player) && !c.dead);
        let npcs_alive = self
            .combatants
            .iter()
            .any(|c| matches!(c.kind, crate::combatant::CombatantKind::Npc) && !c.dead);
        players_alive && npcs_alive
    }

    /// True once every living combatant has either explicitly passed or run
    /// out of AP for the round.
    pub fn all_actions_submitted(&self) -> bool {
        self.combatants
            .iter()
            .filter(|c| !c.dead)
            .all(|c| {
                self.action_queues
                    .get(&c.id)
                    .map(ActionQueue::is_done)
                    .unwrap_or(true)
            })
    }

    pub fn reset_round(&mut self) {
        for queue in self.action_queues.values_mut() {
            queue.reset();
        }
    }

    pub fn active_conditions(&self, combatant_id: &str) -> Vec<&ActiveCondition> {
        self.conditions
            .get(combatant_id)
            .map(|m| m.values().collect())
            .unwrap_or_default()
    }

    pub fn ac_penalty_for(&self, combatant_id: &str, registry: &dyn crate::condition::ConditionRegistry) -> i32 {
        self.active_conditions(combatant_id)
            .iter()
            .filter_map(|ac| registry.get(&ac.id).map(|def| ac.ac_penalty(def)))
            .sum()
    }

    pub fn attack_penalty_for(
        &self,
        combatant_id: &str,
        registry: &dyn crate::condition::ConditionRegistry,
    ) -> i32 {
        self.active_conditions(combatant_id)
            .iter()
            .filter_map(|ac| registry.get(&ac.id).map(|def| ac.attack_penalty(def)))
            .sum()
    }
}
