use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GameError;

/// Weapon/equipment/inventory state a character carries between sessions.
/// Deliberately flat: the orchestrator only ever replaces the whole record,
/// it never mutates individual fields through this contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterLoadout {
    pub weapon_presets: Vec<String>,
    pub equipment: HashMap<String, String>,
    pub inventory: Vec<String>,
    pub starting_inventory_granted: bool,
}

/// External persistence collaborator for character state. Every operation
/// is context-scoped (the orchestrator wraps calls in `tokio::time::timeout`
/// so a slow store cannot stall disconnect cleanup) and may fail; failures
/// are logged by the caller and never block session teardown.
#[async_trait]
pub trait CharacterSaver: Send + Sync {
    async fn save_state(&self, character_id: &str, room_id: &str, current_hp: i32) -> Result<(), GameError>;

    /// Loads the last saved room/HP pair, if any, so the orchestrator's join
    /// flow can resume a returning character in their last room instead of
    /// the zone's global start room.
    async fn load_state(&self, character_id: &str) -> Result<Option<(String, i32)>, GameError>;

    async fn load_loadout(&self, character_id: &str) -> Result<CharacterLoadout, GameError>;

    async fn save_loadout(&self, character_id: &str, loadout: &CharacterLoadout) -> Result<(), GameError>;
}

#[derive(Debug, Clone)]
struct SavedCharacter {
    room_id: String,
    current_hp: i32,
    loadout: CharacterLoadout,
}

/// In-memory test double for `CharacterSaver`. Never fails; useful for
/// orchestrator tests that want a working persistence layer without a real
/// store behind it.
#[derive(Default)]
pub struct InMemoryCharacterSaver {
    characters: Mutex<HashMap<String, SavedCharacter>>,
}

impl InMemoryCharacterSaver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CharacterSaver for InMemoryCharacterSaver {
    async fn save_state(&self, character_id: &str, room_id: &str, current_hp: i32) -> Result<(), GameError> {
        let mut characters = self.characters.lock().expect("character saver lock");
        let entry = characters.entry(character_id.to_string()).or_insert_with(|| SavedCharacter {
            room_id: room_id.to_string(),
            current_hp,
            loadout: CharacterLoadout::default(),
        });
        entry.room_id = room_id.to_string();
        entry.current_hp = current_hp;
        Ok(())
    }

    async fn load_state(&self, character_id: &str) -> Result<Option<(String, i32)>, GameError> {
        let characters = self.characters.lock().expect("character saver lock");
        Ok(characters.get(character_id).map(|c| (c.room_id.clone(), c.current_hp)))
    }

    async fn load_loadout(&self, character_id: &str) -> Result<CharacterLoadout, GameError> {
        let characters = self.characters.lock().expect("character saver lock");
        Ok(characters
            .get(character_id)
            .map(|c| c.loadout.clone())
            .unwrap_or_default())
    }

    async fn save_loadout(&self, character_id: &str, loadout: &CharacterLoadout) -> Result<(), GameError> {
        let mut characters = self.characters.lock().expect("character saver lock");
        let entry = characters.entry(character_id.to_string()).or_insert_with(|| SavedCharacter {
            room_id: String::new(),
            current_hp: 0,
            loadout: CharacterLoadout::default(),
        });
        entry.loadout = loadout.clone();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccountRole {
    Player,
    Moderator,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub role: AccountRole,
}

/// External collaborator for account lookups and role changes, used only by
/// the setrole handler and gated by the caller's own role.
#[async_trait]
pub trait AccountAdmin: Send + Sync {
    async fn get_account_by_username(&self, username: &str) -> Result<Account, GameError>;

    async fn set_account_role(&self, username: &str, role: AccountRole) -> Result<(), GameError>;
}

/// In-memory test double, seeded with accounts up front.
#[derive(Default)]
pub struct InMemoryAccountAdmin {
    accounts: Mutex<HashMap<String, Account>>,
}

impl InMemoryAccountAdmin {
    pub fn new(seed: Vec<Account>) -> Self {
        let accounts = seed.into_iter().map(|a| (a.username.clone(), a)).collect();
        Self {
            accounts: Mutex::new(accounts),
        }
    }
}

#[async_trait]
impl AccountAdmin for InMemoryAccountAdmin {
    async fn get_account_by_username(&self, username: &str) -> Result<Account, GameError> {
        self.accounts
            .lock()
            .expect("account admin lock")
            .get(username)
            .cloned()
            .ok_or_else(|| GameError::NotFound(format!("account {username}")))
    }

    async fn set_account_role(&self, username: &str, role: AccountRole) -> Result<(), GameError> {
        let mut accounts = self.accounts.lock().expect("account admin lock");
        let account = accounts
            .get_mut(username)
            .ok_or_else(|| GameError::NotFound(format!("account {username}")))?;
        account.role = role;
        warn!(username = %username, ?role, "account role changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_reload_state_round_trips() {
        let saver = InMemoryCharacterSaver::new();
        assert!(saver.load_state("char1").await.unwrap().is_none());
        saver.save_state("char1", "room1", 15).await.unwrap();
        assert_eq!(saver.load_state("char1").await.unwrap(), Some(("room1".to_string(), 15)));
        let loadout = saver.load_loadout("char1").await.unwrap();
        assert!(!loadout.starting_inventory_granted);
    }

    #[tokio::test]
    async fn save_loadout_round_trips() {
        let saver = InMemoryCharacterSaver::new();
        let loadout = CharacterLoadout {
            weapon_presets: vec!["shiv".into()],
            starting_inventory_granted: true,
            ..Default::default()
        };
        saver.save_loadout("char1", &loadout).await.unwrap();
        let reloaded = saver.load_loadout("char1").await.unwrap();
        assert!(reloaded.starting_inventory_granted);
        assert_eq!(reloaded.weapon_presets, vec!["shiv".to_string()]);
    }

    #[tokio::test]
    async fn set_role_rejects_unknown_account() {
        let admin = InMemoryAccountAdmin::new(vec![Account {
            username: "alice".into(),
            role: AccountRole::Player,
        }]);
        assert!(admin.set_account_role("ghost", AccountRole::Admin).await.is_err());
        admin.set_account_role("alice", AccountRole::Moderator).await.unwrap();
        let account = admin.get_account_by_username("alice").await.unwrap();
        assert_eq!(account.role, AccountRole::Moderator);
    }
}
