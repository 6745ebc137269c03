//! Composition root for live rooms: owns presence and the connection
//! directory, runs every inbound event through the relays, and fans the
//! resulting deliveries out to connection outboxes.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::{RelayError, RelayResult};

use super::{
    call,
    directory::ConnectionDirectory,
    events::{ClientEvent, ConnectionId, Delivery, MediaPayload, RoomUser, ServerEvent, Target, TextPayload},
    msg,
    presence::PresenceTracker,
    store::RoomStore,
};

/// Events queued for a socket that is not reading are dropped past this depth.
pub(crate) const OUTBOX_CAPACITY: usize = 256;

type Outbox = mpsc::Sender<ServerEvent>;

#[derive(Default)]
struct CoordinatorState {
    presence: PresenceTracker,
    directory: ConnectionDirectory,
    outboxes: HashMap<ConnectionId, Outbox>,
}

impl CoordinatorState {
    /// Pushes every delivery into its recipients' outboxes. Runs under the
    /// state lock, so all recipients see concurrent dispatches in one order.
    fn dispatch(&self, deliveries: Vec<Delivery>) {
        for Delivery { target, event } in deliveries {
            match target {
                Target::Room(room_id) => {
                    for connection_id in self.directory.members_of(&room_id) {
                        self.send(connection_id, &event);
                    }
                }
                Target::RoomExcept(room_id, except) => {
                    for connection_id in self.directory.members_of(&room_id).filter(|c| *c != except) {
                        self.send(connection_id, &event);
                    }
                }
                Target::Connection(connection_id) => {
                    self.send(connection_id, &event);
                }
            }
        }
    }

    fn send(&self, connection_id: ConnectionId, event: &ServerEvent) {
        let Some(outbox) = self.outboxes.get(&connection_id) else {
            return;
        };
        match outbox.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!(connection = %connection_id, "outbox full, event dropped"),
            // the socket task is already tearing down
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn join_room(&mut self, from: ConnectionId, RoomUser { room_id, username }: RoomUser) -> Vec<Delivery> {
        if let Some(previous) = self.directory.remember(from, &room_id, &username) {
            debug!(connection = %from, from_room = %previous.room_id, to_room = %room_id, "switching rooms");
        }
        let online = self.presence.join(&room_id, &username);
        info!(connection = %from, room = %room_id, username = %username, "joined room");
        vec![Delivery::room(&room_id, ServerEvent::OnlineUsers(online))]
    }

    /// Every room still listing the departing name gets a fresh presence
    /// snapshot and a call-left notice, not only the room it last joined.
    fn cleanup(&mut self, connection_id: ConnectionId) -> Vec<Delivery> {
        self.outboxes.remove(&connection_id);
        let Some(membership) = self.directory.forget(connection_id) else {
            return Vec::new();
        };

        info!(
            connection = %connection_id,
            room = %membership.room_id,
            username = %membership.username,
            "left rooms"
        );

        let mut deliveries = Vec::new();
        for (room_id, online) in self.presence.evict(&membership.username) {
            deliveries.push(Delivery::room(&room_id, ServerEvent::OnlineUsers(online)));
            deliveries.push(Delivery::room(&room_id, ServerEvent::UserLeftCall { connection_id }));
        }
        deliveries
    }
}

struct Inner {
    store: Arc<dyn RoomStore>,
    state: Mutex<CoordinatorState>,
    /// Per-room gates held from persist until broadcast.
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

#[derive(Clone)]
pub struct RoomCoordinator {
    inner: Arc<Inner>,
}

impl RoomCoordinator {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                state: Mutex::new(CoordinatorState::default()),
                gates: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &dyn RoomStore {
        self.inner.store.as_ref()
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        // handlers never panic while holding the lock; recover anyway
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new connection. Its first outbound event is `connected`.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let connection_id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let _ = tx.try_send(ServerEvent::Connected { connection_id });
        self.state().outboxes.insert(connection_id, tx);
        info!(connection = %connection_id, "client connected");
        (connection_id, rx)
    }

    /// Runs once per connection, after its socket closed.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let mut state = self.state();
        let deliveries = state.cleanup(connection_id);
        state.dispatch(deliveries);
        info!(connection = %connection_id, "client disconnected");
    }

    pub fn online_users(&self, room_id: &str) -> Vec<String> {
        self.state().presence.snapshot(room_id)
    }

    pub fn is_connected(&self, connection_id: ConnectionId) -> bool {
        self.state().outboxes.contains_key(&connection_id)
    }

    /// Handles one inbound event. Failures are logged here and never reach
    /// the client.
    pub async fn handle(&self, from: ConnectionId, event: ClientEvent) {
        let name = event.name();
        match self.try_handle(from, event).await {
            Ok(()) => {}
            Err(e @ RelayError::InvalidTarget(_)) => {
                debug!(connection = %from, event = name, error = %e, "signal dropped");
            }
            Err(e) => {
                warn!(connection = %from, event = name, error = %e, "handler failed");
            }
        }
    }

    async fn try_handle(&self, from: ConnectionId, event: ClientEvent) -> RelayResult<()> {
        let store = self.store();
        match event {
            ClientEvent::JoinRoom(join) => {
                let mut state = self.state();
                let deliveries = state.join_room(from, join);
                state.dispatch(deliveries);
                Ok(())
            }
            ClientEvent::SendMessage(TextPayload { room_id, username, message }) => {
                self.persist_then_broadcast(&room_id, msg::post_text(store, &room_id, &username, message))
                    .await
            }
            ClientEvent::SendVoiceMessage(MediaPayload { room_id, username, url }) => {
                self.persist_then_broadcast(&room_id, msg::post_voice(store, &room_id, &username, url))
                    .await
            }
            ClientEvent::SendImageMessage(MediaPayload { room_id, username, url }) => {
                self.persist_then_broadcast(&room_id, msg::post_image(store, from, &room_id, &username, url))
                    .await
            }
            ClientEvent::DeleteMessage(delete) => {
                let room_id = delete.room_id;
                self.persist_then_broadcast(&room_id, msg::delete_message(store, &room_id, delete.message_id))
                    .await
            }
            ClientEvent::JoinCall(RoomUser { room_id, username }) => {
                self.persist_then_broadcast(&room_id, call::join_call(store, from, &room_id, &username))
                    .await
            }
            ClientEvent::LeaveCall(RoomUser { room_id, username }) => {
                self.persist_then_broadcast(&room_id, call::leave_call(store, from, &room_id, &username))
                    .await
            }
            ClientEvent::Offer(offer) => self.forward(call::forward_offer(from, offer)),
            ClientEvent::Answer(answer) => self.forward(call::forward_answer(from, answer)),
            ClientEvent::IceCandidate(candidate) => self.forward(call::forward_ice_candidate(from, candidate)),
        }
    }

    /// Holds the room's gate across `work`, so broadcasts leave in the
    /// order the persists completed.
    async fn persist_then_broadcast(
        &self,
        room_id: &str,
        work: impl Future<Output = RelayResult<Vec<Delivery>>>,
    ) -> RelayResult<()> {
        let gate = self.gate(room_id);
        let result = {
            let _held = gate.lock().await;
            work.await.map(|deliveries| self.state().dispatch(deliveries))
        };
        drop(gate);
        self.release_gate(room_id);
        result
    }

    fn forward(&self, delivery: Delivery) -> RelayResult<()> {
        let state = self.state();
        if let Target::Connection(to) = delivery.target {
            if !state.outboxes.contains_key(&to) {
                return Err(RelayError::InvalidTarget(to.to_string()));
            }
        }
        state.dispatch(vec![delivery]);
        Ok(())
    }

    fn gate(&self, room_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.inner.gates.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        gates.entry(room_id.to_owned()).or_default().clone()
    }

    fn release_gate(&self, room_id: &str) {
        let mut gates = self.inner.gates.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if gates.get(room_id).is_some_and(|gate| Arc::strong_count(gate) == 1) {
            gates.remove(room_id);
        }
    }
}
