use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::content::{LootTable, NpcTemplate};
use crate::error::GameError;

/// One spawned, mutable instance of a template. The display name can
/// diverge from the template name once a sibling instance forces a letter
/// suffix.
#[derive(Debug, Clone)]
pub struct NpcInstance {
    pub id: String,
    pub template_id: String,
    pub room_id: String,
    pub display_name: String,
    pub current_hp: i32,
    pub max_hp: i32,
    pub ac: i32,
    pub level: u32,
    pub str_mod: i32,
    pub dex_mod: i32,
    pub ai_domain: Option<String>,
    pub loot: LootTable,
    pub taunts: Vec<String>,
    pub taunt_chance: f32,
    pub taunt_cooldown_secs: u64,
    pub last_taunt_time: Option<Duration>,
}

impl NpcInstance {
    pub fn is_dead(&self) -> bool {
        self.current_hp <= 0
    }
}

fn letter_suffix(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

/// Concurrent NPC map-and-set: instances by id, and a per-room ordered list
/// of ids, plus a monotone per-(template, room) counter for id allocation.
#[derive(Default)]
pub struct NpcRegistry {
    instances: DashMap<String, NpcInstance>,
    rooms: DashMap<String, Vec<String>>,
    counters: DashMap<(String, String), u32>,
}

impl NpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh instance id `"<templateId>-<roomId>-<n>"`, insert it
    /// into both indexes, and rewrite display names with letter suffixes
    /// when a second instance of the same template lands in the room.
    pub fn spawn(&self, template: &NpcTemplate, room_id: &str) -> String {
        let counter_key = (template.id.clone(), room_id.to_string());
        let n = {
            let mut counter = self.counters.entry(counter_key).or_insert(0);
            *counter += 1;
            *counter
        };
        let id = format!("{}-{}-{}", template.id, room_id, n);

        let mut room_ids = self.rooms.entry(room_id.to_string()).or_default();
        let siblings: Vec<String> = room_ids
            .iter()
            .filter(|existing| {
                self.instances
                    .get(*existing)
                    .map(|inst| inst.template_id == template.id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let display_name = if siblings.is_empty() {
            template.name.clone()
        } else {
            if siblings.len() == 1 {
                if let Some(mut first) = self.instances.get_mut(&siblings[0]) {
                    first.display_name = format!("{} {}", template.name, letter_suffix(0));
                }
            }
            format!("{} {}", template.name, letter_suffix(siblings.len()))
        };

        room_ids.push(id.clone());
        drop(room_ids);

        self.instances.insert(
            id.clone(),
            NpcInstance {
                id: id.clone(),
                template_id: template.id.clone(),
                room_id: room_id.to_string(),
                display_name,
                current_hp: template.max_hp,
                max_hp: template.max_hp,
                ac: template.ac,
                level: template.level,
                str_mod: template.str_mod,
                dex_mod: template.dex_mod,
                ai_domain: template.ai_domain.clone(),
                loot: template.loot.clone(),
                taunts: template.taunts.clone(),
                taunt_chance: template.taunt_chance,
                taunt_cooldown_secs: template.taunt_cooldown_secs,
                last_taunt_time: None,
            },
        );
        debug!(npc = %id, room = %room_id, "npc spawned");
        id
    }

    pub fn remove(&self, id: &str) -> Result<NpcInstance, GameError> {
        let (_, instance) = self
            .instances
            .remove(id)
            .ok_or_else(|| GameError::NotFound(format!("npc {id}")))?;
        if let Some(mut room_ids) = self.rooms.get_mut(&instance.room_id) {
            room_ids.retain(|existing| existing != id);
        }
        Ok(instance)
    }

    pub fn get(&self, id: &str) -> Option<NpcInstance> {
        self.instances.get(id).map(|entry| entry.clone())
    }

    pub fn apply_damage(&self, id: &str, amount: i32) -> Option<i32> {
        self.instances.get_mut(id).map(|mut inst| {
            inst.current_hp = (inst.current_hp - amount).max(0);
            inst.current_hp
        })
    }

    /// Stamps `now` as the instance's last-taunt time, for the cooldown gate
    /// in the idle behavior driver.
    pub fn record_taunt(&self, id: &str, now: Duration) {
        if let Some(mut inst) = self.instances.get_mut(id) {
            inst.last_taunt_time = Some(now);
        }
    }

    /// Move an instance between rooms, atomically under per-entry locking:
    /// remove from the old room set, write the new room id, insert into the
    /// new room set.
    pub fn move_to(&self, id: &str, new_room_id: &str) -> Result<(), GameError> {
        let mut instance = self
            .instances
            .get_mut(id)
            .ok_or_else(|| GameError::NotFound(format!("npc {id}")))?;
        let old_room_id = instance.room_id.clone();
        instance.room_id = new_room_id.to_string();
        drop(instance);

        if let Some(mut room_ids) = self.rooms.get_mut(&old_room_id) {
            room_ids.retain(|existing| existing != id);
        }
        self.rooms
            .entry(new_room_id.to_string())
            .or_default()
            .push(id.to_string());
        Ok(())
    }

    pub fn ids_in_room(&self, room_id: &str) -> Vec<String> {
        self.rooms.get(room_id).map(|v| v.clone()).unwrap_or_default()
    }

    pub fn in_room(&self, room_id: &str) -> Vec<NpcInstance> {
        self.ids_in_room(room_id)
            .into_iter()
            .filter_map(|id| self.get(&id))
            .collect()
    }

    /// Case-insensitive display-name prefix match within a room, returning
    /// the first match in room-set iteration order.
    pub fn find_in_room(&self, room_id: &str, prefix: &str) -> Option<NpcInstance> {
        let prefix = prefix.to_lowercase();
        self.ids_in_room(room_id).into_iter().find_map(|id| {
            self.get(&id)
                .filter(|inst| inst.display_name.to_lowercase().starts_with(&prefix))
        })
    }

    pub fn count_in_room(&self, room_id: &str) -> usize {
        self.ids_in_room(room_id).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(id: &str) -> NpcTemplate {
        NpcTemplate {
            id: id.to_string(),
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
            taunts: Vec::new(),
            taunt_chance: 0.0,
            taunt_cooldown_secs: 0,
        }
    }

    #[test]
    fn spawn_allocates_distinct_ids() {
        let registry = NpcRegistry::new();
        let t = template("ganger");
        let a = registry.spawn(&t, "room1");
        let b = registry.spawn(&t, "room1");
        assert_ne!(a, b);
        assert_eq!(registry.count_in_room("room1"), 2);
    }

    #[test]
    fn second_arrival_retroactively_renames_first() {
        let registry = NpcRegistry::new();
        let t = template("ganger");
        let first = registry.spawn(&t, "room1");
        assert_eq!(registry.get(&first).unwrap().display_name, "Ganger");
        let second = registry.spawn(&t, "room1");
        assert_eq!(registry.get(&first).unwrap().display_name, "Ganger A");
        assert_eq!(registry.get(&second).unwrap().display_name, "Ganger B");
        let third = registry.spawn(&t, "room1");
        assert_eq!(registry.get(&third).unwrap().display_name, "Ganger C");
    }

    #[test]
    fn remove_unknown_id_is_not_found() {
        let registry = NpcRegistry::new();
        assert!(matches!(registry.remove("ghost"), Err(GameError::NotFound(_))));
    }

    #[test]
    fn move_updates_both_room_sets() {
        let registry = NpcRegistry::new();
        let t = template("ganger");
        let id = registry.spawn(&t, "room1");
        registry.move_to(&id, "room2").unwrap();
        assert_eq!(registry.count_in_room("room1"), 0);
        assert_eq!(registry.count_in_room("room2"), 1);
        assert_eq!(registry.get(&id).unwrap().room_id, "room2");
    }

    #[test]
    fn find_in_room_matches_prefix_case_insensitively() {
        let registry = NpcRegistry::new();
        let t = template("ganger");
        registry.spawn(&t, "room1");
        let found = registry.find_in_room("room1", "gan").unwrap();
        assert_eq!(found.display_name, "Ganger");
        assert!(registry.find_in_room("room1", "zzz").is_none());
    }

    #[test]
    fn spawn_carries_loot_and_taunt_fields_from_the_template() {
        let registry = NpcRegistry::new();
        let mut t = template("ganger");
        t.loot.currency.min = 1;
        t.loot.currency.max = 5;
        t.taunts = vec!["Come get some.".to_string()];
        t.taunt_chance = 0.5;
        t.taunt_cooldown_secs = 30;
        let id = registry.spawn(&t, "room1");

        let instance = registry.get(&id).unwrap();
        assert_eq!(instance.loot.currency.min, 1);
        assert_eq!(instance.loot.currency.max, 5);
        assert_eq!(instance.taunts, vec!["Come get some.".to_string()]);
        assert_eq!(instance.taunt_chance, 0.5);
        assert_eq!(instance.taunt_cooldown_secs, 30);
        assert!(instance.last_taunt_time.is_none());
    }

    #[test]
    fn record_taunt_stamps_last_taunt_time() {
        let registry = NpcRegistry::new();
        let t = template("ganger");
        let id = registry.spawn(&t, "room1");
        registry.record_taunt(&id, Duration::from_secs(100));
        assert_eq!(registry.get(&id).unwrap().last_taunt_time, Some(Duration::from_secs(100)));
    }
}
