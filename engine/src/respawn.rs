use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::content::TemplateCatalog;
use crate::npc_registry::NpcRegistry;

/// One room's respawn policy for one template: cap and delay.
#[derive(Debug, Clone)]
pub struct RoomSpawnConfig {
    pub template_id: String,
    pub max: usize,
    pub respawn_delay: Option<Duration>,
}

#[derive(Debug, Clone)]
struct PendingRespawn {
    template_id: String,
    room_id: String,
    ready_at: Duration,
}

/// Holds per-room spawn configs and a time-ordered pending list. `schedule`
/// may be called from any task; `tick` and `populate_room` must be
/// serialized externally by the caller (the zone tick manager).
pub struct RespawnScheduler {
    configs: DashMap<String, Vec<RoomSpawnConfig>>,
    pending: Mutex<Vec<PendingRespawn>>,
}

impl RespawnScheduler {
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn set_room_configs(&self, room_id: &str, configs: Vec<RoomSpawnConfig>) {
        self.configs.insert(room_id.to_string(), configs);
    }

    /// Parses the template's `respawn_delay` string (e.g. `"5m"`, `"30s"`)
    /// as a room-level override when nonzero, falling back to the
    /// template's own delay, and zero otherwise.
    pub fn resolved_delay(&self, template_id: &str, room_id: &str, catalog: &TemplateCatalog) -> Duration {
        if let Some(configs) = self.configs.get(room_id) {
            if let Some(cfg) = configs.iter().find(|c| c.template_id == template_id) {
                if let Some(delay) = cfg.respawn_delay {
                    if delay > Duration::ZERO {
                        return delay;
                    }
                }
            }
        }
        catalog
            .get(template_id)
            .and_then(|t| t.respawn_delay.as_deref())
            .and_then(parse_delay_string)
            .unwrap_or(Duration::ZERO)
    }

    /// For each room config, bring the live count up (or down) to exactly
    /// `max`, used at startup.
    pub fn populate_room(&self, room_id: &str, npcs: &NpcRegistry, catalog: &TemplateCatalog) {
        let Some(configs) = self.configs.get(room_id).map(|c| c.clone()) else {
            return;
        };
        for config in configs {
            let Some(template) = catalog.get(&config.template_id) else {
                warn!(template = %config.template_id, "unknown template in spawn config, skipping");
                continue;
            };
            let existing: Vec<String> = npcs
                .in_room(room_id)
                .into_iter()
                .filter(|inst| inst.template_id == config.template_id)
                .map(|inst| inst.id)
                .collect();

            if existing.len() > config.max {
                for id in existing.iter().skip(config.max) {
                    let _ = npcs.remove(id);
                }
            } else {
                for _ in existing.len()..config.max {
                    npcs.spawn(template, room_id);
                }
            }
        }
    }

    /// Appends a pending respawn `delay` from `now`. A non-positive delay
    /// is a no-op: nothing worth scheduling.
    pub fn schedule(&self, template_id: &str, room_id: &str, now: Duration, delay: Duration) {
        if delay == Duration::ZERO {
            return;
        }
        let ready_at = now + delay;
        self.pending.lock().expect("pending lock").push(PendingRespawn {
            template_id: template_id.to_string(),
            room_id: room_id.to_string(),
            ready_at,
        });
        debug!(template = %template_id, room = %room_id, "respawn scheduled");
    }

    /// Drains every pending entry whose `ready_at <= now`, spawning a fresh
    /// instance when the room still has headroom under its cap. Explicit
    /// `now` is passed in by the caller; there is no internal margin.
    pub fn tick(&self, now: Duration, npcs: &NpcRegistry, catalog: &TemplateCatalog) {
        let due: Vec<PendingRespawn> = {
            let mut pending = self.pending.lock().expect("pending lock");
            let mut due = Vec::new();
            pending.retain(|entry| {
                if entry.ready_at <= now {
                    due.push(entry.clone());
                    false
                } else {
                    true
                }
            });
            due
        };

        for entry in due {
            let Some(configs) = self.configs.get(&entry.room_id) else {
                continue;
            };
            let Some(config) = configs.iter().find(|c| c.template_id == entry.template_id).cloned() else {
                continue;
            };
            drop(configs);
            let Some(template) = catalog.get(&entry.template_id) else {
                continue;
            };
            let live = npcs
                .in_room(&entry.room_id)
                .into_iter()
                .filter(|inst| inst.template_id == entry.template_id)
                .count();
            if live < config.max {
                npcs.spawn(template, &entry.room_id);
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("pending lock").len()
    }
}

impl Default for RespawnScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_delay_string(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (value, unit) = s.split_at(s.len().saturating_sub(1));
    let n: u64 = value.parse().ok()?;
    match unit {
        "s" => Some(Duration::from_secs(n)),
        "m" => Some(Duration::from_secs(n * 60)),
        "h" => Some(Duration::from_secs(n * 3600)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::NpcTemplate;

    fn catalog() -> TemplateCatalog {
        TemplateCatalog::new(vec![NpcTemplate {
            id: "ganger".into(),
            name: "Ganger".into(),
            description: String::new(),
            level: 1,
            max_hp: 10,
            ac: 10,
            str_mod: 0,
            dex_mod: 0,
            ai_domain: None,
            respawn_delay: Some("5m".into()),
            loot: Default::default(),
            taunts: Vec::new(),
            taunt_chance: 0.0,
            taunt_cooldown_secs: 0,
        }])
    }

    #[test]
    fn populate_room_tops_up_to_cap() {
        let scheduler = RespawnScheduler::new();
        scheduler.set_room_configs(
            "room1",
            vec![RoomSpawnConfig {
                template_id: "ganger".into(),
                max: 2,
                respawn_delay: None,
            }],
        );
        let npcs = NpcRegistry::new();
        let catalog = catalog();
        scheduler.populate_room("room1", &npcs, &catalog);
        assert_eq!(npcs.count_in_room("room1"), 2);
    }

    #[test]
    fn populate_room_trims_excess() {
        let scheduler = RespawnScheduler::new();
        scheduler.set_room_configs(
            "room1",
            vec![RoomSpawnConfig {
                template_id: "ganger".into(),
                max: 2,
                respawn_delay: None,
            }],
        );
        let npcs = NpcRegistry::new();
        let catalog = catalog();
        for _ in 0..3 {
            npcs.spawn(catalog.get("ganger").unwrap(), "room1");
        }
        scheduler.populate_room("room1", &npcs, &catalog);
        assert_eq!(npcs.count_in_room("room1"), 2);
    }

    #[test]
    fn tick_respects_exact_ready_at_boundary() {
        let scheduler = RespawnScheduler::new();
        scheduler.set_room_configs(
            "room1",
            vec![RoomSpawnConfig {
                template_id: "ganger".into(),
                max: 1,
                respawn_delay: None,
            }],
        );
        let npcs = NpcRegistry::new();
        let catalog = catalog();
        let t0 = Duration::from_secs(1_000);
        let delay = Duration::from_secs(300);
        scheduler.schedule("ganger", "room1", t0, delay);

        scheduler.tick(t0 + delay - Duration::from_secs(1), &npcs, &catalog);
        assert_eq!(npcs.count_in_room("room1"), 0);

        scheduler.tick(t0 + delay, &npcs, &catalog);
        assert_eq!(npcs.count_in_room("room1"), 1);
        assert_eq!(scheduler.pending_len(), 0);
    }

    #[test]
    fn schedule_is_a_noop_for_nonpositive_delay() {
        let scheduler = RespawnScheduler::new();
        scheduler.schedule("ganger", "room1", Duration::ZERO, Duration::ZERO);
        assert_eq!(scheduler.pending_len(), 0);
    }
}
