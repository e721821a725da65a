use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::error::GameError;

const BRIDGE_QUEUE_CAPACITY: usize = 64;

/// The per-session bounded outbound queue bridging the handler layer and
/// the transport layer. Push is non-blocking: a full queue drops the event
/// and reports `QueueFull` to the caller, who logs and continues rather
/// than failing whatever triggered the broadcast.
pub struct BridgeEntity {
    tx: mpsc::Sender<Vec<u8>>,
    rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    closed: AtomicBool,
}

impl BridgeEntity {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel(BRIDGE_QUEUE_CAPACITY);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn push(&self, data: Vec<u8>) -> Result<(), GameError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GameError::Transient("bridge entity closed".into()));
        }
        match self.tx.try_send(data) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("bridge entity queue full, dropping event");
                Err(GameError::Transient("queue full".into()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(GameError::Transient("bridge entity closed".into()))
            }
        }
    }

    /// Takes the consumer end for the transport forwarder. Returns `None`
    /// if it has already been taken.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.rx.lock().await.take()
    }

    /// Idempotent: marks the bridge closed so further pushes are rejected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// One connected player's session state. `room_id` is mutated in place
/// (under its own lock) rather than requiring callers to replace the
/// whole `Arc<Session>`, since the bridge entity inside can't be cloned.
pub struct Session {
    pub uid: String,
    pub char_name: String,
    room_id: std::sync::Mutex<String>,
    pub entity: Arc<BridgeEntity>,
    currency: AtomicU64,
}

impl Session {
    pub fn room_id(&self) -> String {
        self.room_id.lock().expect("session room_id lock").clone()
    }

    pub fn currency(&self) -> u64 {
        self.currency.load(Ordering::Relaxed)
    }

    /// Adds loot currency to the session's running total, e.g. credited to
    /// the killing player when an NPC's loot table is rolled.
    pub fn credit_currency(&self, amount: u32) {
        self.currency.fetch_add(amount as u64, Ordering::Relaxed);
    }
}

/// Concurrent session map, with secondary indexes by room and by character
/// display name, analogous to the NPC registry.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    rooms: DashMap<String, Vec<String>>,
    names: DashMap<String, String>,
    dropped: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(
        &self,
        uid: &str,
        char_name: &str,
        room_id: &str,
    ) -> Result<Arc<Session>, GameError> {
        if self.sessions.contains_key(uid) {
            return Err(GameError::Conflict(format!("{uid} already connected")));
        }
        let session = Arc::new(Session {
            uid: uid.to_string(),
            char_name: char_name.to_string(),
            room_id: std::sync::Mutex::new(room_id.to_string()),
            entity: Arc::new(BridgeEntity::new()),
            currency: AtomicU64::new(0),
        });
        self.sessions.insert(uid.to_string(), Arc::clone(&session));
        self.rooms.entry(room_id.to_string()).or_default().push(uid.to_string());
        self.names.insert(char_name.to_string(), uid.to_string());
        Ok(session)
    }

    pub fn remove_player(&self, uid: &str) -> Result<Arc<Session>, GameError> {
        let (_, session) = self
            .sessions
            .remove(uid)
            .ok_or_else(|| GameError::NotFound(format!("session {uid}")))?;
        session.entity.close();
        if let Some(mut room_ids) = self.rooms.get_mut(&session.room_id()) {
            room_ids.retain(|existing| existing != uid);
        }
        self.names.remove(&session.char_name);
        Ok(session)
    }

    pub fn get(&self, uid: &str) -> Option<Arc<Session>> {
        self.sessions.get(uid).map(|entry| Arc::clone(entry.value()))
    }

    /// Moves a player between rooms, returning the old room id for the
    /// caller to broadcast a departure against.
    pub fn move_player(&self, uid: &str, new_room_id: &str) -> Result<String, GameError> {
        let session = self
            .sessions
            .get(uid)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GameError::NotFound(format!("session {uid}")))?;
        let old_room_id = {
            let mut room_id = session.room_id.lock().expect("session room_id lock");
            let old = room_id.clone();
            *room_id = new_room_id.to_string();
            old
        };
        if let Some(mut room_ids) = self.rooms.get_mut(&old_room_id) {
            room_ids.retain(|existing| existing != uid);
        }
        self.rooms
            .entry(new_room_id.to_string())
            .or_default()
            .push(uid.to_string());
        Ok(old_room_id)
    }

    pub fn player_uids_in_room(&self, room_id: &str) -> Vec<String> {
        self.rooms.get(room_id).map(|v| v.clone()).unwrap_or_default()
    }

    pub fn players_in_room(&self, room_id: &str) -> Vec<String> {
        self.player_uids_in_room(room_id)
            .into_iter()
            .filter_map(|uid| self.get(&uid).map(|s| s.char_name.clone()))
            .collect()
    }

    pub fn get_player_by_char_name(&self, char_name: &str) -> Option<Arc<Session>> {
        self.names.get(char_name).and_then(|uid| self.get(&uid))
    }

    /// Push a serialized event to every session in a room except an
    /// optional excluded uid (usually the actor). Broadcasts never block:
    /// a push failure is logged and skipped, never aborting the loop.
    pub fn broadcast_room(&self, room_id: &str, payload: &[u8], exclude: Option<&str>) {
        for uid in self.player_uids_in_room(room_id) {
            if Some(uid.as_str()) == exclude {
                continue;
            }
            if let Some(session) = self.get(&uid) {
                if let Err(err) = session.entity.push(payload.to_vec()) {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(uid = %uid, error = %err, "broadcast push failed");
                }
            }
        }
    }

    /// Count of broadcast pushes dropped so far (queue full or closed
    /// bridge), exposed for observability since metrics export is out of
    /// scope.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_player_rejects_duplicate_uid() {
        let registry = SessionRegistry::new();
        registry.add_player("u1", "Alice", "room1").unwrap();
        let err = registry.add_player("u1", "Alice2", "room1").unwrap_err();
        assert!(matches!(err, GameError::Conflict(_)));
    }

    #[test]
    fn move_player_updates_room_indexes_and_returns_old_room() {
        let registry = SessionRegistry::new();
        registry.add_player("u1", "Alice", "room1").unwrap();
        let old = registry.move_player("u1", "room2").unwrap();
        assert_eq!(old, "room1");
        assert_eq!(registry.player_uids_in_room("room1"), Vec::<String>::new());
        assert_eq!(registry.player_uids_in_room("room2"), vec!["u1".to_string()]);
    }

    #[test]
    fn remove_player_closes_bridge_and_is_idempotent_on_close() {
        let registry = SessionRegistry::new();
        let session = registry.add_player("u1", "Alice", "room1").unwrap();
        registry.remove_player("u1").unwrap();
        assert!(session.entity.push(b"hi".to_vec()).is_err());
        session.entity.close();
        session.entity.close();
    }

    #[tokio::test]
    async fn broadcast_excludes_the_named_actor() {
        let registry = SessionRegistry::new();
        let alice = registry.add_player("alice", "Alice", "room1").unwrap();
        let bob = registry.add_player("bob", "Bob", "room1").unwrap();
        let mut alice_events = alice.entity.take_events().await.unwrap();
        let mut bob_events = bob.entity.take_events().await.unwrap();

        registry.broadcast_room("room1", b"hi", Some("alice"));

        assert_eq!(bob_events.try_recv().unwrap(), b"hi".to_vec());
        assert!(alice_events.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_events_counts_pushes_into_a_closed_bridge() {
        let registry = SessionRegistry::new();
        let alice = registry.add_player("alice", "Alice", "room1").unwrap();
        assert_eq!(registry.dropped_events(), 0);
        alice.entity.close();
        registry.broadcast_room("room1", b"hi", None);
        assert_eq!(registry.dropped_events(), 1);
    }

    #[test]
    fn credit_currency_accumulates() {
        let registry = SessionRegistry::new();
        let session = registry.add_player("u1", "Alice", "room1").unwrap();
        assert_eq!(session.currency(), 0);
        session.credit_currency(15);
        session.credit_currency(5);
        assert_eq!(session.currency(), 20);
    }

    #[test]
    fn find_player_by_char_name() {
        let registry = SessionRegistry::new();
        registry.add_player("u1", "Alice", "room1").unwrap();
        assert!(registry.get_player_by_char_name("Alice").is_some());
        assert!(registry.get_player_by_char_name("Ghost").is_none());
    }
}
