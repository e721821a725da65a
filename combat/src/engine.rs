use std::collections::HashMap;

use tracing::info;

use crate::action::QueuedAction;
use crate::attack::{resolve_attack, AttackResolution};
use crate::combat::Combat;
use crate::combatant::Combatant;
use crate::condition::{ConditionRegistry, Duration};
use crate::dice::DiceRoller;
use crate::error::CombatError;

/// Owns every room's combat record. One engine instance is shared behind
/// whatever mutex the caller's async runtime needs; this type itself does
/// no locking and assumes exclusive access per call.
#[derive(Default)]
pub struct CombatEngine {
    rooms: HashMap<String, Combat>,
}

impl CombatEngine {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    pub fn start_combat(
        &mut self,
        room_id: &str,
        combatants: Vec<Combatant>,
        ap_budget: u32,
        dice: &mut dyn DiceRoller,
    ) -> Result<(), CombatError> {
        if self.rooms.contains_key(room_id) {
            return Err(CombatError::AlreadyActive(room_id.to_string()));
        }
        let combat = Combat::start(room_id, combatants, ap_budget, dice);
        info!(room = %room_id, "combat engine registered new combat");
        self.rooms.insert(room_id.to_string(), combat);
        Ok(())
    }

    pub fn get_combat(&self, room_id: &str) -> Option<&Combat> {
        self.rooms.get(room_id)
    }

    pub fn get_combat_mut(&mut self, room_id: &str) -> Option<&mut Combat> {
        self.rooms.get_mut(room_id)
    }

    pub fn end_combat(&mut self, room_id: &str) -> Option<Combat> {
        let ended = self.rooms.remove(room_id);
        if ended.is_some() {
            info!(room = %room_id, "combat ended");
        }
        ended
    }

    pub fn current_turn(&self, room_id: &str) -> Result<Option<&Combatant>, CombatError> {
        let combat = self
            .rooms
            .get(room_id)
            .ok_or_else(|| CombatError::NotFound(room_id.to_string()))?;
        Ok(combat.current_combatant())
    }

    pub fn advance_turn(&mut self, room_id: &str) -> Result<Option<&Combatant>, CombatError> {
        let combat = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| CombatError::NotFound(room_id.to_string()))?;
        Ok(combat.advance_turn())
    }

    /// Enqueue an action for a combatant, rejecting it if the action name is
    /// restricted by one of the combatant's active conditions or if there's
    /// not enough AP remaining.
    pub fn enqueue_action(
        &mut self,
        room_id: &str,
        combatant_id: &str,
        action_name: &str,
        target: Option<String>,
        registry: &dyn ConditionRegistry,
    ) -> Result<(), CombatError> {
        let combat = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| CombatError::NotFound(room_id.to_string()))?;

        if combat.combatant(combatant_id).is_none() {
            return Err(CombatError::UnknownCombatant(combatant_id.to_string()));
        }

        let restricted = combat
            .active_conditions(combatant_id)
            .iter()
            .any(|ac| registry.get(&ac.id).map(|def| def.restricts(action_name)).unwrap_or(false));
        if restricted {
            return Err(CombatError::ActionRestricted {
                combatant: combatant_id.to_string(),
                action: action_name.to_string(),
            });
        }

        let kind = crate::action::ActionKind::from_action_name(action_name);
        let ap_cost = kind.ap_cost();
        let queue = combat
            .action_queues
            .get_mut(combatant_id)
            .ok_or_else(|| CombatError::UnknownCombatant(combatant_id.to_string()))?;

        let queued = QueuedAction {
            kind,
            target,
            ap_cost,
        };
        if !queue.try_enqueue(queued) {
            return Err(CombatError::InsufficientAp(combatant_id.to_string()));
        }
        Ok(())
    }

    pub fn apply_condition(
        &mut self,
        room_id: &str,
        combatant_id: &str,
        condition_id: &str,
        stacks: u32,
        duration: Duration,
        registry: &dyn ConditionRegistry,
    ) -> Result<bool, CombatError> {
        let combat = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| CombatError::NotFound(room_id.to_string()))?;
        if combat.combatant(combatant_id).is_none() {
            return Err(CombatError::UnknownCombatant(combatant_id.to_string()));
        }
        let active = combat.conditions.entry(combatant_id.to_string()).or_default();
        Ok(crate::condition::apply_condition(
            active,
            registry,
            condition_id,
            stacks,
            duration,
        ))
    }

    pub fn active_conditions(
        &self,
        room_id: &str,
        combatant_id: &str,
    ) -> Result<Vec<&crate::condition::ActiveCondition>, CombatError> {
        let combat = self
            .rooms
            .get(room_id)
            .ok_or_else(|| CombatError::NotFound(room_id.to_string()))?;
        Ok(combat.active_conditions(combatant_id))
    }

    /// Resolve an attack between two combatants already in the room's
    /// combat, applying the winner's condition penalties and the loser's
    /// damage. Dies the defender's `dead` flag through `apply_damage`.
    pub fn resolve_attack(
        &mut self,
        room_id: &str,
        attacker_id: &str,
        defender_id: &str,
        weapon_damage_sides: u32,
        dice: &mut dyn DiceRoller,
        registry: &dyn ConditionRegistry,
    ) -> Result<AttackResolution, CombatError> {
        let combat = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| CombatError::NotFound(room_id.to_string()))?;

        let attacker_str_mod = combat
            .combatant(attacker_id)
            .ok_or_else(|| CombatError::UnknownCombatant(attacker_id.to_string()))?
            .str_mod;
        let defender_ac = combat
            .combatant(defender_id)
            .ok_or_else(|| CombatError::UnknownCombatant(defender_id.to_string()))?
            .ac;

        let defender_ac_penalty = combat.ac_penalty_for(defender_id, registry);
        let attacker_damage_penalty = combat.attack_penalty_for(attacker_id, registry);

        let resolution = resolve_attack(
            dice,
            attacker_str_mod,
            defender_ac,
            defender_ac_penalty,
            attacker_damage_penalty,
            weapon_damage_sides,
        );

        if resolution.damage > 0 {
            if let Some(defender) = combat.combatant_mut(defender_id) {
                defender.apply_damage(resolution.damage);
            }
        }

        if !combat.is_active() {
            info!(room = %room_id, "combat no longer has living combatants on both sides");
        }

        Ok(resolution)
    }
}
