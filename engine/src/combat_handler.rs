use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use htn::{Planner, Registry, WorldState};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use combat::{
    ActiveCondition, Combat, CombatEngine, Combatant, CombatantKind, ConditionRegistry, Duration as CondDuration,
    DiceLootRoller, DiceRoller, LootRoller, ThreadRngDiceRoller,
};

use crate::content::TemplateCatalog;
use crate::error::GameError;
use crate::floor::{FloorItem, RoomFloor};
use crate::npc_registry::{NpcInstance, NpcRegistry};
use crate::respawn::RespawnScheduler;
use crate::session_registry::SessionRegistry;

/// A narrated combat event, emitted as a stream during round resolution.
/// These are collected while `combatMu` is held and dispatched to
/// broadcast only after release.
#[derive(Debug, Clone)]
pub enum CombatEvent {
    Initiative { room_id: String, order: Vec<String> },
    Attack {
        room_id: String,
        attacker: String,
        defender: String,
        outcome: combat::AttackOutcome,
        damage: i32,
    },
    Death { room_id: String, combatant: String, killer: String },
    LootCredited { room_id: String, player_uid: String, currency: u32 },
    LootDropped { room_id: String, items: Vec<String> },
    ConditionApplied { room_id: String, combatant: String, condition_id: String },
    ConditionRemoved { room_id: String, combatant: String, condition_id: String },
    EndOfCombat { room_id: String },
}

const DEFAULT_AP_BUDGET: u32 = 3;
const DEFAULT_WEAPON_DIE: u32 = 6;

/// Composes the combat engine with the session/NPC registries, the HTN
/// planner, and the respawn scheduler. `combat_mu` protects all per-room
/// mutation; timer callbacks reacquire it before mutating, and no lock is
/// ever held across a broadcast dispatch.
pub struct CombatHandler {
    combat_mu: Mutex<CombatEngine>,
    npcs: Arc<NpcRegistry>,
    sessions: Arc<SessionRegistry>,
    domains: Arc<Registry>,
    conditions: Arc<dyn ConditionRegistry + Send + Sync>,
    respawn: Arc<RespawnScheduler>,
    catalog: Arc<TemplateCatalog>,
    floor: Arc<RoomFloor>,
    round_duration: Duration,
    ap_budget: u32,
    timers: DashMap<String, JoinHandle<()>>,
}

impl CombatHandler {
    pub fn new(
        npcs: Arc<NpcRegistry>,
        sessions: Arc<SessionRegistry>,
        domains: Arc<Registry>,
        conditions: Arc<dyn ConditionRegistry + Send + Sync>,
        respawn: Arc<RespawnScheduler>,
        catalog: Arc<TemplateCatalog>,
        floor: Arc<RoomFloor>,
        round_duration: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            combat_mu: Mutex::new(CombatEngine::new()),
            npcs,
            sessions,
            domains,
            conditions,
            respawn,
            catalog,
            floor,
            round_duration,
            ap_budget: DEFAULT_AP_BUDGET,
            timers: DashMap::new(),
        })
    }

    /// Engagement: the first command from a player targeting a live NPC in
    /// `room_id` for which no combat yet exists. Rolls initiative, queues
    /// the player's first action, auto-plans NPC actions, and starts the
    /// round timer.
    pub async fn engage(
        self: &Arc<Self>,
        room_id: &str,
        player_uid: &str,
        player_name: &str,
        player_combat_stats: (i32, i32, i32, i32), // hp, ac, str_mod, dex_mod
        npc_id: &str,
        first_action: &str,
        first_target: Option<String>,
    ) -> Result<Vec<CombatEvent>, GameError> {
        let mut engine = self.combat_mu.lock().await;

        if engine.get_combat(room_id).is_some() {
            return Err(GameError::Conflict(format!("combat already active in {room_id}")));
        }

        let npc = self
            .npcs
            .get(npc_id)
            .ok_or_else(|| GameError::NotFound(format!("npc {npc_id}")))?;
        if npc.is_dead() {
            return Err(GameError::Precondition(format!("{npc_id} is already dead")));
        }

        let (hp, ac, str_mod, dex_mod) = player_combat_stats;
        let combatants = vec![
            Combatant::new(player_uid, CombatantKind::Player, player_name, hp, ac, 1, str_mod, dex_mod),
            Combatant::new(&npc.id, CombatantKind::Npc, &npc.display_name, npc.max_hp, npc.ac, npc.level, npc.str_mod, npc.dex_mod),
        ];

        let mut dice = ThreadRngDiceRoller;
        engine.start_combat(room_id, combatants, self.ap_budget, &mut dice)?;

        let order: Vec<String> = engine
            .get_combat(room_id)
            .map(|c| c.combatants.iter().map(|cb| cb.id.clone()).collect())
            .unwrap_or_default();

        engine.enqueue_action(room_id, player_uid, first_action, first_target, self.conditions.as_ref())?;
        self.auto_queue_npcs_locked(&mut engine, room_id);

        self.start_round_timer(room_id.to_string());

        info!(room = %room_id, "combat engaged");
        Ok(vec![CombatEvent::Initiative { room_id: room_id.to_string(), order }])
    }

    /// Submission window: validate, debit, and enqueue one more action for
    /// an already-engaged combatant. Resolves the round immediately
    /// (cancelling the timer) if everyone has submitted.
    pub async fn submit_action(
        self: &Arc<Self>,
        room_id: &str,
        combatant_id: &str,
        action_name: &str,
        target: Option<String>,
    ) -> Result<Vec<CombatEvent>, GameError> {
        let mut engine = self.combat_mu.lock().await;
        if engine.get_combat(room_id).is_none() {
            return Err(GameError::Precondition(format!("no combat active in {room_id}")));
        }
        engine.enqueue_action(room_id, combatant_id, action_name, target, self.conditions.as_ref())?;

        let all_submitted = engine
            .get_combat(room_id)
            .map(Combat::all_actions_submitted)
            .unwrap_or(false);

        if all_submitted {
            self.cancel_timer(room_id);
            return Ok(self.resolve_round_locked(&mut engine, room_id).await);
        }
        Ok(Vec::new())
    }

    /// Opposed flee check: attacker rolls `d20 + STR`, the best living
    /// opposing NPC rolls `d20 + STR`. Success removes the player from the
    /// combat record only (marked dead inside the copy, not the session).
    pub async fn attempt_flee(self: &Arc<Self>, room_id: &str, player_uid: &str) -> Result<bool, GameError> {
        let mut engine = self.combat_mu.lock().await;
        let combat = engine
            .get_combat_mut(room_id)
            .ok_or_else(|| GameError::Precondition(format!("no combat active in {room_id}")))?;

        let player = combat
            .combatant(player_uid)
            .ok_or_else(|| GameError::NotFound(format!("combatant {player_uid}")))?
            .clone();

        let best_npc = combat
            .combatants
            .iter()
            .filter(|c| matches!(c.kind, CombatantKind::Npc) && !c.dead)
            .max_by_key(|c| c.str_mod)
            .cloned();

        let mut dice = ThreadRngDiceRoller;
        let player_roll = dice.roll_d20() as i32 + player.str_mod;
        let escaped = match best_npc {
            None => true,
            Some(npc) => {
                let npc_roll = dice.roll_d20() as i32 + npc.str_mod;
                player_roll > npc_roll
            }
        };

        if escaped {
            if let Some(c) = combat.combatant_mut(player_uid) {
                c.apply_damage(c.current_hp);
            }
            let still_active = combat.is_active();
            if !still_active {
                self.cancel_timer(room_id);
                engine.end_combat(room_id);
            }
        }
        Ok(escaped)
    }

    fn start_round_timer(self: &Arc<Self>, room_id: String) {
        let handler = Arc::clone(self);
        let duration = self.round_duration;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let mut engine = handler.combat_mu.lock().await;
            if engine.get_combat(&room_id).is_none() {
                return;
            }
            let _events = handler.resolve_round_locked(&mut engine, &room_id).await;
        });
        self.timers.insert(room_id, handle);
    }

    /// Idempotent: safe to call even if no timer is registered.
    fn cancel_timer(&self, room_id: &str) {
        if let Some((_, handle)) = self.timers.remove(room_id) {
            handle.abort();
        }
    }

    /// Resolution + post-round, run while `combat_mu` is held. Treats any
    /// combatant that has not submitted a full round as passing, resolves
    /// each queued action in initiative order, removes dead NPCs and rolls
    /// their loot onto the killer and the room floor, schedules respawns,
    /// and either ends combat or starts the next round.
    async fn resolve_round_locked(self: &Arc<Self>, engine: &mut CombatEngine, room_id: &str) -> Vec<CombatEvent> {
        let mut events = Vec::new();

        let combatant_ids: Vec<String> = match engine.get_combat(room_id) {
            Some(combat) => combat.combatants.iter().map(|c| c.id.clone()).collect(),
            None => return events,
        };

        let mut dice = ThreadRngDiceRoller;
        for attacker_id in &combatant_ids {
            let Some(combat) = engine.get_combat(room_id) else { break };
            if combat.combatant(attacker_id).map(|c| c.dead).unwrap_or(true) {
                continue;
            }
            let queued: Vec<combat::QueuedAction> = combat
                .action_queues
                .get(attacker_id)
                .map(|q| q.actions.clone())
                .unwrap_or_default();

            for action in queued {
                let Some(target_id) = action.target.clone() else { continue };
                if !matches!(action.kind, combat::ActionKind::Attack | combat::ActionKind::Strike | combat::ActionKind::FireBurst | combat::ActionKind::FireAuto | combat::ActionKind::Throw) {
                    continue;
                }
                match engine.resolve_attack(room_id, attacker_id, &target_id, DEFAULT_WEAPON_DIE, &mut dice, self.conditions.as_ref()) {
                    Ok(resolution) => {
                        events.push(CombatEvent::Attack {
                            room_id: room_id.to_string(),
                            attacker: attacker_id.clone(),
                            defender: target_id.clone(),
                            outcome: resolution.outcome,
                            damage: resolution.damage,
                        });
                        if let Some(defender) = engine.get_combat(room_id).and_then(|c| c.combatant(&target_id)) {
                            if defender.dead {
                                events.push(CombatEvent::Death {
                                    room_id: room_id.to_string(),
                                    combatant: target_id.clone(),
                                    killer: attacker_id.clone(),
                                });
                            }
                        }
                    }
                    Err(err) => warn!(error = %err, "attack resolution failed mid-round"),
                }
            }
        }

        self.handle_post_round(engine, room_id, &mut events);
        events
    }

    fn handle_post_round(self: &Arc<Self>, engine: &mut CombatEngine, room_id: &str, events: &mut Vec<CombatEvent>) {
        let dead_npc_ids: Vec<String> = engine
            .get_combat(room_id)
            .map(|c| {
                c.combatants
                    .iter()
                    .filter(|cb| cb.dead && matches!(cb.kind, CombatantKind::Npc))
                    .map(|cb| cb.id.clone())
                    .collect()
            })
            .unwrap_or_default();

        for npc_id in &dead_npc_ids {
            if let Ok(instance) = self.npcs.remove(npc_id) {
                let killer_uid = events.iter().find_map(|e| match e {
                    CombatEvent::Death { combatant, killer, .. } if combatant == npc_id => Some(killer.clone()),
                    _ => None,
                });
                self.roll_and_distribute_loot(room_id, &instance, killer_uid.as_deref(), events);

                let now = std::time::Duration::from_secs(
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .map(|d| d.as_secs())
                        .unwrap_or(0),
                );
                let delay = self.respawn.resolved_delay(&instance.template_id, &instance.room_id, &self.catalog);
                self.respawn.schedule(&instance.template_id, &instance.room_id, now, delay);
            }
        }

        let still_active = engine.get_combat(room_id).map(Combat::is_active).unwrap_or(false);
        if !still_active {
            engine.end_combat(room_id);
            events.push(CombatEvent::EndOfCombat { room_id: room_id.to_string() });
            return;
        }

        if let Some(combat) = engine.get_combat_mut(room_id) {
            combat.reset_round();
        }
        self.auto_queue_npcs_locked(engine, room_id);
        self.start_round_timer(room_id.to_string());
    }

    /// Rolls a dead NPC's loot table: currency goes to the killer's session
    /// (silently dropped if the killer wasn't a player or has since
    /// disconnected), items land on the room floor.
    fn roll_and_distribute_loot(
        self: &Arc<Self>,
        room_id: &str,
        instance: &NpcInstance,
        killer_uid: Option<&str>,
        events: &mut Vec<CombatEvent>,
    ) {
        let mut dice = ThreadRngDiceRoller;
        let mut roller = DiceLootRoller::new(&mut dice);

        let currency = roller.roll_currency(instance.loot.currency.min, instance.loot.currency.max);
        if currency > 0 {
            if let Some(uid) = killer_uid.and_then(|uid| self.sessions.get(uid)) {
                uid.credit_currency(currency);
                events.push(CombatEvent::LootCredited {
                    room_id: room_id.to_string(),
                    player_uid: uid.uid.clone(),
                    currency,
                });
            }
        }

        let dropped: Vec<FloorItem> = instance
            .loot
            .items
            .iter()
            .filter_map(|spec| {
                roller
                    .roll_item(spec.chance, spec.min_qty, spec.max_qty)
                    .map(|qty| FloorItem { item: spec.item.clone(), qty })
            })
            .collect();

        if !dropped.is_empty() {
            let names = dropped.iter().map(|i| i.item.clone()).collect();
            self.floor.add_items(room_id, dropped);
            events.push(CombatEvent::LootDropped { room_id: room_id.to_string(), items: names });
        }
    }

    /// For every living non-player combatant: plan via its registered
    /// domain if it has one, translating the primitive actions one-for-one
    /// into queued actions (bounded by AP, excess discarded); otherwise
    /// fall back to attacking the first living opposing combatant.
    fn auto_queue_npcs_locked(&self, engine: &mut CombatEngine, room_id: &str) {
        let npc_ids: Vec<String> = engine
            .get_combat(room_id)
            .map(|c| {
                c.combatants
                    .iter()
                    .filter(|cb| matches!(cb.kind, CombatantKind::Npc) && !cb.dead)
                    .map(|cb| cb.id.clone())
                    .collect()
            })
            .unwrap_or_default();

        for npc_id in npc_ids {
            let plan = self.plan_for_npc(engine, room_id, &npc_id);
            if plan.is_empty() {
                self.legacy_fallback_attack(engine, room_id, &npc_id);
                continue;
            }
            for action in plan {
                let target_id = engine
                    .get_combat(room_id)
                    .and_then(|c| c.combatants.iter().find(|cb| cb.name == action.target).map(|cb| cb.id.clone()))
                    .or(Some(action.target.clone()));
                let _ = engine.enqueue_action(room_id, &npc_id, &action.action, target_id, self.conditions.as_ref());
            }
        }
    }

    fn plan_for_npc(&self, engine: &CombatEngine, room_id: &str, npc_id: &str) -> Vec<htn::PlannedAction> {
        let Some(npc) = self.npcs.get(npc_id) else { return Vec::new() };
        let Some(domain_id) = &npc.ai_domain else { return Vec::new() };
        let Some(domain) = self.domains.get(domain_id) else { return Vec::new() };
        let Some(combat) = engine.get_combat(room_id) else { return Vec::new() };

        let state = build_combat_world_state(combat, npc_id);
        let hooks = htn::StaticHookTable::with_builtin_predicates();
        Planner::plan(&domain, &hooks, room_id, &state)
    }

    fn legacy_fallback_attack(&self, engine: &mut CombatEngine, room_id: &str, npc_id: &str) {
        let Some(combat) = engine.get_combat(room_id) else { return };
        let Some(target) = combat
            .combatants
            .iter()
            .find(|c| matches!(c.kind, CombatantKind::Player) && !c.dead)
            .map(|c| c.id.clone())
        else {
            return;
        };
        let _ = engine.enqueue_action(room_id, npc_id, "attack", Some(target), self.conditions.as_ref());
    }

    pub async fn get_combat_snapshot(&self, room_id: &str) -> Option<Vec<Combatant>> {
        let engine = self.combat_mu.lock().await;
        engine.get_combat(room_id).map(|c| c.combatants.clone())
    }

    pub async fn active_conditions(&self, room_id: &str, combatant_id: &str) -> Vec<ActiveCondition> {
        let engine = self.combat_mu.lock().await;
        engine
            .active_conditions(room_id, combatant_id)
            .map(|v| v.into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn apply_condition(
        &self,
        room_id: &str,
        combatant_id: &str,
        condition_id: &str,
        stacks: u32,
        duration: CondDuration,
    ) -> Result<bool, GameError> {
        let mut engine = self.combat_mu.lock().await;
        Ok(engine.apply_condition(room_id, combatant_id, condition_id, stacks, duration, self.conditions.as_ref())?)
    }
}

/// Builds a combat-scoped `WorldState`: every combatant, dead flags, and
/// the self-record, with no room/zone facts (those belong to the idle
/// zone-tick planner path, not combat).
fn build_combat_world_state(combat: &Combat, self_uid: &str) -> WorldState {
    let combatants = combat
        .combatants
        .iter()
        .map(|c| htn::CombatantFact {
            uid: c.id.clone(),
            name: c.name.clone(),
            kind: match c.kind {
                CombatantKind::Player => htn::CombatantKind::Player,
                CombatantKind::Npc => htn::CombatantKind::Npc,
            },
            current_hp: c.current_hp,
            dead: c.dead,
        })
        .collect();
    WorldState::new(self_uid).with_combatants(combatants)
}
