use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use combat::{DiceRoller, ThreadRngDiceRoller};
use htn::{Planner, Registry, WorldState};
use world::Manager;

use crate::npc_registry::NpcRegistry;
use crate::session_registry::SessionRegistry;

/// Registered per-zone callback. Callbacks must not block indefinitely;
/// the manager invokes all of them sequentially from one driver loop, it
/// never spawns a task per callback.
pub type ZoneCallback = Arc<dyn Fn() + Send + Sync>;

/// Drives idle NPC behavior and respawn draining. Holds a map of zone id
/// to callback; `start` launches one task that, on every wall-clock tick,
/// snapshots the map under its own lock and invokes each callback in turn.
pub struct ZoneTickManager {
    callbacks: Arc<DashMap<String, ZoneCallback>>,
    stopped: Arc<AtomicBool>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ZoneTickManager {
    pub fn new() -> Self {
        Self {
            callbacks: Arc::new(DashMap::new()),
            stopped: Arc::new(AtomicBool::new(false)),
            handle: std::sync::Mutex::new(None),
        }
    }

    pub fn register(&self, zone_id: &str, callback: ZoneCallback) {
        self.callbacks.insert(zone_id.to_string(), callback);
    }

    pub fn unregister(&self, zone_id: &str) {
        self.callbacks.remove(zone_id);
    }

    pub fn start(&self, tick_interval: Duration) {
        let mut guard = self.handle.lock().expect("zone tick handle lock");
        if guard.is_some() {
            return;
        }
        let callbacks = Arc::clone(&self.callbacks);
        let stopped = Arc::clone(&self.stopped);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                interval.tick().await;
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                let snapshot: Vec<(String, ZoneCallback)> = callbacks
                    .iter()
                    .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
                    .collect();
                for (zone_id, callback) in snapshot {
                    trace!(zone = %zone_id, "running zone tick callback");
                    callback();
                }
            }
        });
        *guard = Some(handle);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().expect("zone tick handle lock").take() {
            handle.abort();
        }
    }
}

impl Default for ZoneTickManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the planner against every non-combat NPC with a domain in a zone's
/// rooms, driving the idle primitives `move_random` and taunt emission.
/// Combatants never appear here: combat NPCs are driven by the combat
/// handler's own round loop, not the zone tick.
pub struct IdleBehaviorDriver {
    world: Arc<Manager>,
    npcs: Arc<NpcRegistry>,
    domains: Arc<Registry>,
    sessions: Arc<SessionRegistry>,
    dice: std::sync::Mutex<Box<dyn DiceRoller + Send>>,
}

impl IdleBehaviorDriver {
    pub fn new(world: Arc<Manager>, npcs: Arc<NpcRegistry>, domains: Arc<Registry>, sessions: Arc<SessionRegistry>) -> Self {
        Self::with_dice(world, npcs, domains, sessions, Box::new(ThreadRngDiceRoller))
    }

    /// Same as `new`, but with an explicit dice source. Lets taunt-roll
    /// tests substitute a scripted roller instead of the thread-local one.
    pub fn with_dice(
        world: Arc<Manager>,
        npcs: Arc<NpcRegistry>,
        domains: Arc<Registry>,
        sessions: Arc<SessionRegistry>,
        dice: Box<dyn DiceRoller + Send>,
    ) -> Self {
        Self {
            world,
            npcs,
            domains,
            sessions,
            dice: std::sync::Mutex::new(dice),
        }
    }

    /// Scans every room in `zone_id`, running the idle planner for each
    /// domain-driven NPC not currently in combat (`in_combat` decides
    /// that), and applying `move_random`/taunt primitives directly. `now`
    /// is the wall-clock instant used to gate taunt cooldowns.
    pub fn run_zone_tick(&self, zone_id: &str, now: Duration, in_combat: impl Fn(&str) -> bool) {
        let Some(zone) = self.world.zone(zone_id) else {
            warn!(zone = %zone_id, "zone tick requested for unknown zone");
            return;
        };
        for room_id in zone.rooms.keys() {
            for npc in self.npcs.in_room(room_id) {
                if npc.is_dead() || in_combat(&npc.id) {
                    continue;
                }
                let Some(domain_id) = &npc.ai_domain else {
                    continue;
                };
                let Some(domain) = self.domains.get(domain_id) else {
                    continue;
                };
                let hooks = htn::StaticHookTable::with_builtin_predicates();
                let state = WorldState::new(npc.id.clone());
                let actions = Planner::plan(&domain, &hooks, zone_id, &state);
                for action in actions {
                    match action.action.as_str() {
                        "move_random" => self.move_random(room_id, &npc.id),
                        "taunt" => self.try_taunt(room_id, &npc.id, now),
                        _ => {}
                    }
                }
            }
        }
    }

    fn move_random(&self, room_id: &str, npc_id: &str) {
        let Some(room) = self.world.get_room(room_id).ok() else {
            return;
        };
        if room.exits.is_empty() {
            return;
        }
        let visible: Vec<&world::Exit> = room.exits.iter().filter(|e| !e.hidden).collect();
        if visible.is_empty() {
            return;
        }
        let chosen = &visible[rand::rng().random_range(0..visible.len())];
        if let Ok(()) = self.npcs.move_to(npc_id, &chosen.target) {
            trace!(npc = %npc_id, direction = ?chosen.direction, "npc moved idly");
        }
    }

    /// Cooldown + chance gate on a scripted taunt line: skipped if the NPC
    /// has no taunts, is still on cooldown, or fails the chance roll.
    /// Otherwise picks a line, stamps `last_taunt_time`, and broadcasts it
    /// to the room.
    fn try_taunt(&self, room_id: &str, npc_id: &str, now: Duration) {
        let Some(npc) = self.npcs.get(npc_id) else { return };
        if npc.taunts.is_empty() {
            return;
        }
        if let Some(last) = npc.last_taunt_time {
            let cooldown = Duration::from_secs(npc.taunt_cooldown_secs);
            if now.saturating_sub(last) < cooldown {
                trace!(npc = %npc_id, "npc taunt skipped, on cooldown");
                return;
            }
        }

        let mut dice = self.dice.lock().expect("idle behavior dice lock");
        let roll = dice.roll(100);
        if roll as f32 > npc.taunt_chance * 100.0 {
            trace!(npc = %npc_id, "npc taunt skipped, chance roll failed");
            return;
        }
        let index = (dice.roll(npc.taunts.len() as u32) - 1) as usize;
        drop(dice);

        let line = npc.taunts[index].clone();
        self.npcs.record_taunt(npc_id, now);
        let payload = format!("{} taunts: {}", npc.display_name, line);
        self.sessions.broadcast_room(room_id, payload.as_bytes(), None);
        trace!(npc = %npc_id, "npc taunt emitted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat::ScriptedDiceRoller;
    use world::Zone;

    use crate::content::NpcTemplate;

    fn sample_world() -> Arc<Manager> {
        let room = world::Room {
            id: "room1".into(),
            zone_id: "zone1".into(),
            title: "A Dusty Room".into(),
            description: String::new(),
            exits: Vec::new(),
            spawns: Vec::new(),
            properties: Default::default(),
        };
        let zone = Zone {
            id: "zone1".into(),
            name: "Zone One".into(),
            description: String::new(),
            start_room: "room1".into(),
            rooms: [("room1".to_string(), room)].into_iter().collect(),
        };
        Arc::new(Manager::new(vec![zone]).unwrap())
    }

    fn taunting_ganger() -> NpcTemplate {
        NpcTemplate {
            id: "ganger".to_string(),
            name: "Ganger".to_string(),
            description: String::new(),
            level: 1,
            max_hp: 12,
            ac: 10,
            str_mod: 1,
            dex_mod: 0,
            ai_domain: None,
            respawn_delay: None,
            loot: Default::default(),
            taunts: vec!["Come get some.".to_string()],
            taunt_chance: 0.5,
            taunt_cooldown_secs: 60,
        }
    }

    #[tokio::test]
    async fn taunt_fires_on_a_successful_roll_and_broadcasts_to_the_room() {
        let npcs = Arc::new(NpcRegistry::new());
        let sessions = Arc::new(SessionRegistry::new());
        let session = sessions.add_player("u1", "Alice", "room1").unwrap();
        let mut events = session.entity.take_events().await.unwrap();
        let id = npcs.spawn(&taunting_ganger(), "room1");

        // d100 roll of 10 <= 50% chance succeeds; d1 picks the only taunt line.
        let dice: Box<dyn DiceRoller + Send> = Box::new(ScriptedDiceRoller::new(vec![10, 1]));
        let driver = IdleBehaviorDriver::with_dice(sample_world(), npcs.clone(), Arc::new(Registry::new()), sessions, dice);

        driver.try_taunt("room1", &id, Duration::from_secs(100));

        assert_eq!(npcs.get(&id).unwrap().last_taunt_time, Some(Duration::from_secs(100)));
        let payload = events.try_recv().unwrap();
        assert_eq!(payload, b"Ganger taunts: Come get some.".to_vec());
    }

    #[tokio::test]
    async fn taunt_is_skipped_while_on_cooldown() {
        let npcs = Arc::new(NpcRegistry::new());
        let sessions = Arc::new(SessionRegistry::new());
        let id = npcs.spawn(&taunting_ganger(), "room1");
        npcs.record_taunt(&id, Duration::from_secs(50));

        let dice: Box<dyn DiceRoller + Send> = Box::new(ScriptedDiceRoller::new(vec![1, 1]));
        let driver = IdleBehaviorDriver::with_dice(sample_world(), npcs.clone(), Arc::new(Registry::new()), sessions, dice);

        driver.try_taunt("room1", &id, Duration::from_secs(60));

        assert_eq!(npcs.get(&id).unwrap().last_taunt_time, Some(Duration::from_secs(50)));
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_is_safe_before_start() {
        let manager = ZoneTickManager::new();
        manager.stop();
        manager.start(Duration::from_millis(5));
        manager.start(Duration::from_millis(5));
        manager.stop();
    }

    #[test]
    fn register_and_unregister_round_trip() {
        let manager = ZoneTickManager::new();
        manager.register("zone1", Arc::new(|| {}));
        assert!(manager.callbacks.contains_key("zone1"));
        manager.unregister("zone1");
        assert!(!manager.callbacks.contains_key("zone1"));
    }
}
