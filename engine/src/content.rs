use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::GameError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LootCurrency {
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub max: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootItem {
    pub item: String,
    pub chance: f32,
    #[serde(default = "default_qty")]
    pub min_qty: u32,
    #[serde(default = "default_qty")]
    pub max_qty: u32,
}

fn default_qty() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LootTable {
    #[serde(default)]
    pub currency: LootCurrency,
    #[serde(default)]
    pub items: Vec<LootItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Abilities {
    #[serde(default)]
    str_mod: i32,
    #[serde(default)]
    dex_mod: i32,
}

/// A loaded, validated NPC template. Flattens the file's nested `abilities`
/// table since the combat crate only needs the two modifiers it carries.
#[derive(Debug, Clone)]
pub struct NpcTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub level: u32,
    pub max_hp: i32,
    pub ac: i32,
    pub str_mod: i32,
    pub dex_mod: i32,
    pub ai_domain: Option<String>,
    pub respawn_delay: Option<String>,
    pub loot: LootTable,
    pub taunts: Vec<String>,
    pub taunt_chance: f32,
    pub taunt_cooldown_secs: u64,
}

#[derive(Debug, Deserialize)]
struct NpcTemplateFile {
    npc: NpcTemplateDef,
}

#[derive(Debug, Deserialize)]
struct NpcTemplateDef {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    level: u32,
    max_hp: i32,
    ac: i32,
    #[serde(default)]
    perception: u32,
    #[serde(default)]
    abilities: Abilities,
    #[serde(default)]
    ai_domain: Option<String>,
    #[serde(default)]
    respawn_delay: Option<String>,
    #[serde(default)]
    loot: LootTable,
    #[serde(default)]
    taunts: Vec<String>,
    #[serde(default)]
    taunt_chance: f32,
    #[serde(default)]
    taunt_cooldown_secs: u64,
}

fn validate(def: &NpcTemplateDef) -> Result<(), GameError> {
    if def.max_hp < 1 {
        return Err(GameError::Validation(format!(
            "npc template {}: max_hp must be >= 1",
            def.id
        )));
    }
    if def.ac < 10 {
        return Err(GameError::Validation(format!(
            "npc template {}: ac must be >= 10",
            def.id
        )));
    }
    if !(0.0..=1.0).contains(&def.taunt_chance) {
        return Err(GameError::Validation(format!(
            "npc template {}: taunt_chance must be within [0, 1]",
            def.id
        )));
    }
    for item in &def.loot.items {
        if !(item.chance > 0.0 && item.chance <= 1.0) {
            return Err(GameError::Validation(format!(
                "npc template {}: loot item {} chance must be within (0, 1]",
                def.id, item.item
            )));
        }
    }
    let _ = def.perception;
    Ok(())
}

pub fn parse_npc_template(toml_source: &str) -> Result<NpcTemplate, GameError> {
    let file: NpcTemplateFile =
        toml::from_str(toml_source).map_err(|e| GameError::Validation(e.to_string()))?;
    validate(&file.npc)?;
    let def = file.npc;
    Ok(NpcTemplate {
        id: def.id,
        name: def.name,
        description: def.description,
        level: def.level,
        max_hp: def.max_hp,
        ac: def.ac,
        str_mod: def.abilities.str_mod,
        dex_mod: def.abilities.dex_mod,
        ai_domain: def.ai_domain,
        respawn_delay: def.respawn_delay,
        loot: def.loot,
        taunts: def.taunts,
        taunt_chance: def.taunt_chance,
        taunt_cooldown_secs: def.taunt_cooldown_secs,
    })
}

pub fn load_npc_template_file(path: impl AsRef<Path>) -> Result<NpcTemplate, GameError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .map_err(|e| GameError::Validation(format!("{}: {e}", path.display())))?;
    let template = parse_npc_template(&source)?;
    info!(template = %template.id, path = %path.display(), "npc template loaded");
    Ok(template)
}

/// Simple in-memory catalog of loaded templates, keyed by id. Immutable
/// after construction and shared without locks, the same guarantee the
/// world graph gives its zones.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, NpcTemplate>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<NpcTemplate>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&NpcTemplate> {
        self.templates.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [npc]
        id = "ganger"
        name = "Ganger"
        level = 1
        max_hp = 12
        ac = 10
        ai_domain = "ganger_combat"
        respawn_delay = "5m"

        [npc.abilities]
        str_mod = 1
        dex_mod = 0

        [npc.loot]
        [npc.loot.currency]
        min = 1
        max = 5

        [[npc.loot.items]]
        item = "shiv"
        chance = 0.3
    "#;

    #[test]
    fn parses_valid_template() {
        let template = parse_npc_template(SAMPLE).unwrap();
        assert_eq!(template.id, "ganger");
        assert_eq!(template.ai_domain.as_deref(), Some("ganger_combat"));
        assert_eq!(template.loot.items.len(), 1);
    }

    #[test]
    fn rejects_hp_below_one() {
        let bad = SAMPLE.replace("max_hp = 12", "max_hp = 0");
        assert!(parse_npc_template(&bad).is_err());
    }

    #[test]
    fn rejects_ac_below_ten() {
        let bad = SAMPLE.replace("ac = 10", "ac = 5");
        assert!(parse_npc_template(&bad).is_err());
    }

    #[test]
    fn rejects_out_of_range_loot_chance() {
        let bad = SAMPLE.replace("chance = 0.3", "chance = 1.5");
        assert!(parse_npc_template(&bad).is_err());
    }
}
