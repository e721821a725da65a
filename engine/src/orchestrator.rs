use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use world::{Direction, Manager};

use crate::clock::GameClock;
use crate::combat_handler::{CombatEvent, CombatHandler};
use crate::error::{GameError, Quit};
use crate::floor::RoomFloor;
use crate::npc_registry::NpcRegistry;
use crate::persistence::{Account, AccountAdmin, AccountRole, CharacterSaver};
use crate::session_registry::{Session, SessionRegistry};

const SAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Inbound request surface. A partial enumeration: chat/look/exit/inventory
/// plumbing is dispatched to placeholder narration, since their content
/// formatting sits outside this crate's scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    JoinWorld { character_id: String, char_name: String, caller_role: AccountRole },
    Move { direction: Direction },
    Look,
    Exits,
    Say { text: String },
    Emote { text: String },
    Who,
    Quit,
    Attack { target: String },
    Flee,
    Pass,
    Strike { target: String },
    SetRole { username: String, role: AccountRole },
    Status,
}

/// Outbound event surface. A partial enumeration, mirroring `Command`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RoomView { room_id: String, title: String, description: String },
    RoomEvent { text: String },
    Message { from: String, text: String },
    PlayerList { names: Vec<String> },
    ExitList { directions: Vec<String> },
    CombatEvent { narrative: String },
    CharacterInfo { char_name: String, room_id: String },
    TimeOfDay { hour: u32 },
    Disconnected,
    Error { message: String },
}

/// A request envelope: an optional correlation id the response mirrors back,
/// plus the request itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub correlation_id: Option<String>,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub correlation_id: Option<String>,
    #[serde(flatten)]
    pub event: Event,
}

impl OutboundMessage {
    fn untagged(event: Event) -> Self {
        Self { correlation_id: None, event }
    }
}

/// The transport's inbound command source. A real websocket/TCP layer reads
/// frames and decodes them into `InboundMessage`; this crate never names the
/// wire protocol.
#[async_trait]
pub trait InboundCommands: Send {
    async fn recv(&mut self) -> Option<InboundMessage>;
}

/// The transport's outbound event sink.
#[async_trait]
pub trait OutboundEvents: Send {
    async fn send(&mut self, message: OutboundMessage) -> Result<(), GameError>;
}

/// Ties the session/NPC registries, world graph, combat handler, game clock,
/// and persistence/admin collaborators together behind one per-session
/// command loop. Generic over nothing itself: the orchestrator is a plain
/// struct, and `run_session` is generic over the transport traits (A4) so no
/// concrete wire protocol is named here.
pub struct SessionOrchestrator {
    world: Arc<Manager>,
    sessions: Arc<SessionRegistry>,
    npcs: Arc<NpcRegistry>,
    combat: Arc<CombatHandler>,
    clock: Arc<GameClock>,
    saver: Arc<dyn CharacterSaver>,
    admin: Arc<dyn AccountAdmin>,
}

impl SessionOrchestrator {
    pub fn new(
        world: Arc<Manager>,
        sessions: Arc<SessionRegistry>,
        npcs: Arc<NpcRegistry>,
        combat: Arc<CombatHandler>,
        clock: Arc<GameClock>,
        saver: Arc<dyn CharacterSaver>,
        admin: Arc<dyn AccountAdmin>,
    ) -> Arc<Self> {
        Arc::new(Self { world, sessions, npcs, combat, clock, saver, admin })
    }

    /// Drives one connected player's session end to end: join, command fan-in,
    /// broadcast forwarding, clock ticks, and disconnect cleanup. Returns once
    /// the transport's inbound stream ends, the client sends `Quit`, or an
    /// unrecoverable error terminates the session.
    pub async fn run_session<I, O>(self: Arc<Self>, mut inbound: I, mut outbound: O)
    where
        I: InboundCommands,
        O: OutboundEvents,
    {
        let Some(first) = inbound.recv().await else { return };
        let Command::JoinWorld { character_id, char_name, caller_role: _ } = first.command else {
            let _ = outbound
                .send(OutboundMessage::untagged(Event::Error { message: "first message must be join_world".into() }))
                .await;
            return;
        };

        let start_room = self.resolve_start_room(&character_id).await;
        let session = match self.sessions.add_player(&character_id, &char_name, &start_room) {
            Ok(session) => session,
            Err(err) => {
                let _ = outbound.send(OutboundMessage::untagged(Event::Error { message: err.to_string() })).await;
                return;
            }
        };

        let Some(mut bridge_rx) = session.entity.take_events().await else {
            warn!(uid = %character_id, "session bridge already taken, refusing duplicate join");
            let _ = self.sessions.remove_player(&character_id);
            return;
        };

        let (clock_id, mut clock_rx) = self.clock.subscribe();

        self.send_room_view(&mut outbound, &start_room).await;
        self.broadcast_room_event(&start_room, format!("{char_name} arrives."), Some(&character_id));

        loop {
            tokio::select! {
                inbound_msg = inbound.recv() => {
                    match inbound_msg {
                        Some(msg) => {
                            let correlation_id = msg.correlation_id.clone();
                            match self.dispatch(&session, msg.command).await {
                                DispatchOutcome::Events(events) => {
                                    for event in events {
                                        if outbound
                                            .send(OutboundMessage { correlation_id: correlation_id.clone(), event })
                                            .await
                                            .is_err()
                                        {
                                            warn!(uid = %character_id, "outbound send failed, ending session");
                                            break;
                                        }
                                    }
                                }
                                DispatchOutcome::Error(err) => {
                                    let _ = outbound
                                        .send(OutboundMessage { correlation_id, event: Event::Error { message: err.to_string() } })
                                        .await;
                                }
                                DispatchOutcome::Quit => break,
                            }
                        }
                        None => break,
                    }
                }
                Some(payload) = bridge_rx.recv() => {
                    match serde_json::from_slice::<OutboundMessage>(&payload) {
                        Ok(message) => {
                            if outbound.send(message).await.is_err() {
                                warn!(uid = %character_id, "outbound forward failed, ending session");
                                break;
                            }
                        }
                        Err(err) => warn!(error = %err, "dropped malformed bridge payload"),
                    }
                }
                Some(hour) = clock_rx.recv() => {
                    let _ = outbound.send(OutboundMessage::untagged(Event::TimeOfDay { hour })).await;
                }
                else => break,
            }
        }

        self.clock.unsubscribe(clock_id);
        self.teardown(&character_id, &char_name).await;
        let _ = outbound.send(OutboundMessage::untagged(Event::Disconnected)).await;
    }

    async fn resolve_start_room(&self, character_id: &str) -> String {
        match self.saver.load_state(character_id).await {
            Ok(Some((room_id, _hp))) => room_id,
            Ok(None) => self.world.zone_ids().next().map(String::from).unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "character state load failed, using zone start room");
                self.world.zone_ids().next().map(String::from).unwrap_or_default()
            }
        }
    }

    async fn send_room_view<O: OutboundEvents>(&self, outbound: &mut O, room_id: &str) {
        let event = match self.world.get_room(room_id) {
            Ok(room) => Event::RoomView { room_id: room.id.clone(), title: room.title.clone(), description: room.description.clone() },
            Err(err) => Event::Error { message: err.to_string() },
        };
        let _ = outbound.send(OutboundMessage::untagged(event)).await;
    }

    fn broadcast_event(&self, room_id: &str, event: Event, exclude: Option<&str>) {
        match serde_json::to_vec(&OutboundMessage::untagged(event)) {
            Ok(payload) => self.sessions.broadcast_room(room_id, &payload, exclude),
            Err(err) => warn!(error = %err, "failed to serialize broadcast event"),
        }
    }

    fn broadcast_room_event(&self, room_id: &str, text: String, exclude: Option<&str>) {
        self.broadcast_event(room_id, Event::RoomEvent { text }, exclude);
    }

    async fn dispatch(&self, session: &Arc<Session>, command: Command) -> DispatchOutcome {
        let uid = session.uid.clone();
        let room_id = session.room_id();
        match command {
            Command::JoinWorld { .. } => {
                DispatchOutcome::Error(GameError::Precondition("already joined".into()))
            }
            Command::Quit => DispatchOutcome::Quit,
            Command::Look => {
                let mut events = Vec::new();
                match self.world.get_room(&room_id) {
                    Ok(room) => events.push(Event::RoomView {
                        room_id: room.id.clone(),
                        title: room.title.clone(),
                        description: room.description.clone(),
                    }),
                    Err(err) => return DispatchOutcome::Error(err.into()),
                }
                DispatchOutcome::Events(events)
            }
            Command::Exits => match self.world.get_room(&room_id) {
                Ok(room) => DispatchOutcome::Events(vec![Event::ExitList {
                    directions: room.exits.iter().map(|e| format!("{:?}", e.direction).to_lowercase()).collect(),
                }]),
                Err(err) => DispatchOutcome::Error(err.into()),
            },
            Command::Who => DispatchOutcome::Events(vec![Event::PlayerList { names: self.sessions.players_in_room(&room_id) }]),
            Command::Status => DispatchOutcome::Events(vec![Event::CharacterInfo { char_name: session.char_name.clone(), room_id }]),
            Command::Move { direction } => self.handle_move(session, direction).await,
            Command::Say { text } => {
                self.broadcast_event(&room_id, Event::Message { from: session.char_name.clone(), text: text.clone() }, Some(&uid));
                DispatchOutcome::Events(vec![Event::Message { from: session.char_name.clone(), text }])
            }
            Command::Emote { text } => {
                let narrated = format!("{} {}", session.char_name, text);
                self.broadcast_room_event(&room_id, narrated.clone(), Some(&uid));
                DispatchOutcome::Events(vec![Event::RoomEvent { text: narrated }])
            }
            Command::Attack { target } => self.handle_attack(session, &target).await,
            Command::Strike { target } => self.handle_strike(session, &target).await,
            Command::Flee => self.handle_flee(session).await,
            Command::Pass => self.handle_pass(session).await,
            Command::SetRole { username, role } => self.handle_set_role(session, &username, role).await,
        }
    }

    async fn handle_move(&self, session: &Arc<Session>, direction: Direction) -> DispatchOutcome {
        let from_room = session.room_id();
        let destination = match self.world.navigate(&from_room, direction) {
            Ok(room) => room.id.clone(),
            Err(err) => return DispatchOutcome::Error(err.into()),
        };
        if let Err(err) = self.sessions.move_player(&session.uid, &destination) {
            return DispatchOutcome::Error(err);
        }
        self.broadcast_room_event(&from_room, format!("{} leaves.", session.char_name), Some(&session.uid));
        self.broadcast_room_event(&destination, format!("{} arrives.", session.char_name), Some(&session.uid));
        match self.world.get_room(&destination) {
            Ok(room) => DispatchOutcome::Events(vec![Event::RoomView {
                room_id: room.id.clone(),
                title: room.title.clone(),
                description: room.description.clone(),
            }]),
            Err(err) => DispatchOutcome::Error(err.into()),
        }
    }

    async fn handle_attack(&self, session: &Arc<Session>, target: &str) -> DispatchOutcome {
        let room_id = session.room_id();
        let Some(npc) = self.npcs.find_in_room(&room_id, target) else {
            return DispatchOutcome::Error(GameError::NotFound(format!("npc {target}")));
        };
        let result = self
            .combat
            .engage(
                &room_id,
                &session.uid,
                &session.char_name,
                (20, 12, 1, 0),
                &npc.id,
                "attack",
                Some(npc.id.clone()),
            )
            .await;
        self.finish_combat_dispatch(&room_id, result)
    }

    async fn handle_strike(&self, session: &Arc<Session>, target: &str) -> DispatchOutcome {
        let room_id = session.room_id();
        let result = self.combat.submit_action(&room_id, &session.uid, "strike", Some(target.to_string())).await;
        self.finish_combat_dispatch(&room_id, result)
    }

    async fn handle_pass(&self, session: &Arc<Session>) -> DispatchOutcome {
        let room_id = session.room_id();
        let result = self.combat.submit_action(&room_id, &session.uid, "pass", None).await;
        self.finish_combat_dispatch(&room_id, result)
    }

    async fn handle_flee(&self, session: &Arc<Session>) -> DispatchOutcome {
        let room_id = session.room_id();
        match self.combat.attempt_flee(&room_id, &session.uid).await {
            Ok(escaped) => {
                let text = if escaped { "You break away from the fight." } else { "You fail to escape." };
                DispatchOutcome::Events(vec![Event::RoomEvent { text: text.to_string() }])
            }
            Err(err) => DispatchOutcome::Error(err),
        }
    }

    fn finish_combat_dispatch(&self, room_id: &str, result: Result<Vec<CombatEvent>, GameError>) -> DispatchOutcome {
        match result {
            Ok(events) => {
                let narrated: Vec<Event> = events.iter().map(narrate_combat_event).collect();
                for event in &narrated {
                    self.broadcast_event(room_id, event.clone(), None);
                }
                DispatchOutcome::Events(narrated)
            }
            Err(err) => DispatchOutcome::Error(err),
        }
    }

    async fn handle_set_role(&self, session: &Arc<Session>, username: &str, role: AccountRole) -> DispatchOutcome {
        let caller: Result<Account, GameError> = self.admin.get_account_by_username(&session.char_name).await;
        match caller {
            Ok(caller) if caller.role == AccountRole::Admin => match self.admin.set_account_role(username, role).await {
                Ok(()) => DispatchOutcome::Events(vec![Event::RoomEvent { text: format!("{username}'s role is now {role:?}") }]),
                Err(err) => DispatchOutcome::Error(err),
            },
            Ok(_) => DispatchOutcome::Error(GameError::Precondition("caller is not an admin".into())),
            Err(err) => DispatchOutcome::Error(err),
        }
    }

    async fn teardown(&self, character_id: &str, char_name: &str) {
        let room_id = self
            .sessions
            .get(character_id)
            .map(|session| session.room_id())
            .unwrap_or_default();

        let current_hp = 20;
        match tokio::time::timeout(SAVE_TIMEOUT, self.saver.save_state(character_id, &room_id, current_hp)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, uid = %character_id, "character save failed during disconnect"),
            Err(_) => warn!(uid = %character_id, "character save timed out during disconnect"),
        }

        if let Err(err) = self.sessions.remove_player(character_id) {
            warn!(error = %err, uid = %character_id, "session removal failed during disconnect");
        }
        if !room_id.is_empty() {
            self.broadcast_room_event(&room_id, format!("{char_name} leaves."), None);
        }
        info!(uid = %character_id, "session disconnected");
    }
}

enum DispatchOutcome {
    Events(Vec<Event>),
    Error(GameError),
    Quit,
}

fn narrate_combat_event(event: &CombatEvent) -> Event {
    let narrative = match event {
        CombatEvent::Initiative { order, .. } => format!("Initiative rolled: {}", order.join(", ")),
        CombatEvent::Attack { attacker, defender, outcome, damage, .. } => {
            format!("{attacker} attacks {defender}: {outcome:?} for {damage} damage")
        }
        CombatEvent::Death { combatant, killer, .. } => format!("{combatant} falls to {killer}."),
        CombatEvent::LootCredited { player_uid, currency, .. } => format!("{player_uid} loots {currency} currency."),
        CombatEvent::LootDropped { items, .. } => format!("Loot drops to the floor: {}.", items.join(", ")),
        CombatEvent::ConditionApplied { combatant, condition_id, .. } => format!("{combatant} is afflicted with {condition_id}."),
        CombatEvent::ConditionRemoved { combatant, condition_id, .. } => format!("{combatant} shakes off {condition_id}."),
        CombatEvent::EndOfCombat { .. } => "The fight is over.".to_string(),
    };
    Event::CombatEvent { narrative }
}

/// Recognized only so the sentinel type is referenced somewhere public;
/// handlers that need to unwind a session cleanly return `GameError` today
/// (no handler in this crate raises `Quit` directly — `Command::Quit` short
/// circuits before reaching a handler), but the type stays part of the
/// public error surface for callers outside this crate that do.
#[allow(dead_code)]
fn _quit_sentinel_is_part_of_the_public_surface(_q: Quit) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat_handler::CombatHandler;
    use crate::content::TemplateCatalog;
    use crate::npc_registry::NpcRegistry;
    use crate::persistence::{InMemoryAccountAdmin, InMemoryCharacterSaver};
    use crate::respawn::RespawnScheduler;
    use crate::session_registry::SessionRegistry;
    use combat::InMemoryConditionRegistry;
    use htn::Registry as HtnRegistry;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;
    use world::{Exit, Room, Zone};

    struct ChannelInbound {
        rx: mpsc::UnboundedReceiver<InboundMessage>,
    }

    #[async_trait]
    impl InboundCommands for ChannelInbound {
        async fn recv(&mut self) -> Option<InboundMessage> {
            self.rx.recv().await
        }
    }

    struct RecordingOutbound {
        sent: Arc<StdMutex<Vec<OutboundMessage>>>,
    }

    #[async_trait]
    impl OutboundEvents for RecordingOutbound {
        async fn send(&mut self, message: OutboundMessage) -> Result<(), GameError> {
            self.sent.lock().expect("recording outbound lock").push(message);
            Ok(())
        }
    }

    fn sample_world() -> Arc<Manager> {
        let room = Room {
            id: "room1".into(),
            zone_id: "zone1".into(),
            title: "A Dusty Room".into(),
            description: "Dust everywhere.".into(),
            exits: vec![Exit { direction: Direction::North, target: "room2".into(), locked: false, hidden: false }],
            spawns: Vec::new(),
            properties: Default::default(),
        };
        let room2 = Room {
            id: "room2".into(),
            zone_id: "zone1".into(),
            title: "A Hallway".into(),
            description: "Long and narrow.".into(),
            exits: Vec::new(),
            spawns: Vec::new(),
            properties: Default::default(),
        };
        let rooms: HashMap<String, Room> =
            [("room1".to_string(), room), ("room2".to_string(), room2)].into_iter().collect();
        let zone = Zone {
            id: "zone1".into(),
            name: "Zone One".into(),
            description: String::new(),
            start_room: "room1".into(),
            rooms,
        };
        Arc::new(Manager::new(vec![zone]).unwrap())
    }

    fn orchestrator() -> Arc<SessionOrchestrator> {
        let world = sample_world();
        let sessions = Arc::new(SessionRegistry::new());
        let npcs = Arc::new(NpcRegistry::new());
        let domains = Arc::new(HtnRegistry::new());
        let conditions = Arc::new(InMemoryConditionRegistry::new());
        let respawn = Arc::new(RespawnScheduler::new());
        let catalog = Arc::new(TemplateCatalog::new(Vec::new()));
        let floor = Arc::new(RoomFloor::new());
        let combat = CombatHandler::new(
            npcs.clone(),
            sessions.clone(),
            domains,
            conditions,
            respawn,
            catalog,
            floor,
            Duration::from_secs(30),
        );
        let clock = GameClock::new();
        let saver = Arc::new(InMemoryCharacterSaver::new());
        let admin = Arc::new(InMemoryAccountAdmin::new(Vec::new()));
        SessionOrchestrator::new(world, sessions, npcs, combat, clock, saver, admin)
    }

    #[tokio::test]
    async fn join_then_look_then_quit_disconnects_cleanly() {
        let orchestrator = orchestrator();
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let outbound = RecordingOutbound { sent: sent.clone() };
        let inbound = ChannelInbound { rx };

        tx.send(InboundMessage {
            correlation_id: Some("c1".into()),
            command: Command::JoinWorld { character_id: "u1".into(), char_name: "Alice".into(), caller_role: AccountRole::Player },
        })
        .unwrap();
        tx.send(InboundMessage { correlation_id: Some("c2".into()), command: Command::Look }).unwrap();
        tx.send(InboundMessage { correlation_id: None, command: Command::Quit }).unwrap();
        drop(tx);

        orchestrator.run_session(inbound, outbound).await;

        let events = sent.lock().unwrap();
        assert!(events.iter().any(|m| matches!(m.event, Event::RoomView { .. })));
        assert!(events.iter().any(|m| matches!(m.event, Event::Disconnected)));
    }

    #[tokio::test]
    async fn move_reports_unknown_direction_as_error() {
        let orchestrator = orchestrator();
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let outbound = RecordingOutbound { sent: sent.clone() };
        let inbound = ChannelInbound { rx };

        tx.send(InboundMessage {
            correlation_id: None,
            command: Command::JoinWorld { character_id: "u1".into(), char_name: "Alice".into(), caller_role: AccountRole::Player },
        })
        .unwrap();
        tx.send(InboundMessage { correlation_id: Some("m1".into()), command: Command::Move { direction: Direction::South } }).unwrap();
        tx.send(InboundMessage { correlation_id: None, command: Command::Quit }).unwrap();
        drop(tx);

        orchestrator.run_session(inbound, outbound).await;

        let events = sent.lock().unwrap();
        assert!(events.iter().any(|m| matches!(m.event, Event::Error { .. })));
    }
}
