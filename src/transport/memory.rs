use super::{MeshTransport, PeerHookType, PeerStreamType, Subscription, TransportEvent};
use crate::media::MediaStream;
use crate::testing::{Journal, JournalEntry};
use crate::types::{PeerId, StreamMetadata};
use crate::utils::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use uuid::Uuid;

struct Subscriber {
    id: Uuid,
    stream_kind: PeerStreamType,
    sender: mpsc::UnboundedSender<TransportEvent>,
}

impl Subscriber {
    fn offer(&self, event: &TransportEvent) {
        if let TransportEvent::PeerStream { stream, .. } = event {
            let kind = if stream.has_video() {
                PeerStreamType::Video
            } else {
                PeerStreamType::Audio
            };
            if kind != self.stream_kind {
                return;
            }
        }
        // A closed receiver just means the subscriber is going away.
        let _ = self.sender.send(event.clone());
    }
}

#[derive(Default)]
struct Endpoint {
    subscribers: HashMap<PeerHookType, Subscriber>,
    // Events that arrived before the endpoint's first subscription.
    backlog: Vec<TransportEvent>,
    attached: bool,
}

impl Endpoint {
    fn deliver(&mut self, event: &TransportEvent) {
        if !self.attached {
            self.backlog.push(event.clone());
            return;
        }
        for subscriber in self.subscribers.values() {
            subscriber.offer(event);
        }
    }
}

#[derive(Default)]
struct MeshState {
    order: Vec<PeerId>,
    endpoints: HashMap<PeerId, Endpoint>,
    // (from, to) -> stream ids currently routed
    routes: HashMap<(PeerId, PeerId), Vec<String>>,
    duplicate_routes: usize,
}

impl MeshState {
    fn others(&self, peer_id: &str) -> Vec<PeerId> {
        self.order
            .iter()
            .filter(|id| id.as_str() != peer_id)
            .cloned()
            .collect()
    }
}

/// A whole room living in one process. Every participant gets its own
/// `MemoryTransport` endpoint from `join`.
#[derive(Clone, Default)]
pub struct MemoryMesh {
    state: Arc<Mutex<MeshState>>,
    journal: Journal,
}

impl MemoryMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Arc::new(Mutex::new(MeshState::default())),
            journal,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn join(&self, peer_id: &str) -> Arc<MemoryTransport> {
        let mut state = self.state.lock();
        if state.endpoints.contains_key(peer_id) {
            warn!("Peer {} joined twice", peer_id);
        } else {
            for other in state.endpoints.values_mut() {
                other.deliver(&TransportEvent::PeerJoined(peer_id.to_string()));
            }
            state.order.push(peer_id.to_string());
            state.endpoints.insert(peer_id.to_string(), Endpoint::default());
            info!("Peer {} joined the mesh ({} connected)", peer_id, state.order.len());
        }

        Arc::new(MemoryTransport {
            state: self.state.clone(),
            peer_id: peer_id.to_string(),
            journal: self.journal.clone(),
        })
    }

    /// Disconnects `peer_id`. Its routes disappear and everyone else sees
    /// `PeerLeft`. Returns false if it was not connected.
    pub fn leave(&self, peer_id: &str) -> bool {
        let mut state = self.state.lock();
        if state.endpoints.remove(peer_id).is_none() {
            return false;
        }
        state.order.retain(|id| id != peer_id);
        state
            .routes
            .retain(|(from, to), _| from != peer_id && to != peer_id);

        for other in state.endpoints.values_mut() {
            other.deliver(&TransportEvent::PeerLeft(peer_id.to_string()));
        }
        info!("Peer {} left the mesh ({} connected)", peer_id, state.order.len());
        true
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.state.lock().order.clone()
    }

    /// Stream ids `from` currently routes to `to`.
    pub fn routes(&self, from: &str, to: &str) -> Vec<String> {
        self.state
            .lock()
            .routes
            .get(&(from.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of adds that targeted a peer already holding the same stream.
    pub fn duplicate_routes(&self) -> usize {
        self.state.lock().duplicate_routes
    }

    pub fn subscriber_count(&self, peer_id: &str) -> usize {
        self.state
            .lock()
            .endpoints
            .get(peer_id)
            .map(|e| e.subscribers.len())
            .unwrap_or(0)
    }
}

pub struct MemoryTransport {
    state: Arc<Mutex<MeshState>>,
    peer_id: PeerId,
    journal: Journal,
}

impl MemoryTransport {
    pub fn is_connected(&self) -> bool {
        self.state.lock().endpoints.contains_key(&self.peer_id)
    }

    fn not_connected(&self) -> Error {
        Error::Transport(format!("{} is not connected to the mesh", self.peer_id))
    }
}

#[async_trait]
impl MeshTransport for MemoryTransport {
    fn self_id(&self) -> PeerId {
        self.peer_id.clone()
    }

    fn get_peers(&self) -> Vec<PeerId> {
        let state = self.state.lock();
        if !state.endpoints.contains_key(&self.peer_id) {
            return Vec::new();
        }
        state.others(&self.peer_id)
    }

    async fn add_stream(
        &self,
        stream: &Arc<MediaStream>,
        target: Option<&PeerId>,
        metadata: &StreamMetadata,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if !state.endpoints.contains_key(&self.peer_id) {
            return Err(self.not_connected());
        }

        let targets = match target {
            Some(peer) if state.endpoints.contains_key(peer) && *peer != self.peer_id => {
                vec![peer.clone()]
            }
            Some(peer) => return Err(Error::PublishTargetGone(peer.clone())),
            None => state.others(&self.peer_id),
        };

        let event = TransportEvent::PeerStream {
            stream: stream.clone(),
            peer_id: self.peer_id.clone(),
            metadata: metadata.to_value(),
        };

        for to in targets {
            let routed = state
                .routes
                .entry((self.peer_id.clone(), to.clone()))
                .or_default();
            if routed.iter().any(|id| id == stream.id()) {
                warn!("Stream {} added twice for peer {}", stream.id(), to);
                state.duplicate_routes += 1;
            } else {
                routed.push(stream.id().to_string());
            }

            self.journal.record(JournalEntry::StreamAdded {
                from: self.peer_id.clone(),
                to: to.clone(),
                stream_id: stream.id().to_string(),
            });
            if let Some(endpoint) = state.endpoints.get_mut(&to) {
                endpoint.deliver(&event);
            }
        }
        Ok(())
    }

    async fn remove_stream(&self, stream: &MediaStream, targets: &[PeerId]) -> Result<()> {
        let mut state = self.state.lock();
        let mut gone = None;

        for to in targets {
            if !state.endpoints.contains_key(to) {
                debug!("Skipping stream removal for departed peer {}", to);
                gone.get_or_insert_with(|| to.clone());
                continue;
            }
            if let Some(routed) = state.routes.get_mut(&(self.peer_id.clone(), to.clone())) {
                routed.retain(|id| id != stream.id());
            }
            self.journal.record(JournalEntry::StreamRemoved {
                from: self.peer_id.clone(),
                to: to.clone(),
                stream_id: stream.id().to_string(),
            });
        }

        match gone {
            Some(peer) => Err(Error::PublishTargetGone(peer)),
            None => Ok(()),
        }
    }

    async fn send_action(&self, namespace: &str, action_id: &str, payload: Bytes) -> Result<()> {
        let mut state = self.state.lock();
        if !state.endpoints.contains_key(&self.peer_id) {
            return Err(self.not_connected());
        }

        self.journal.record(JournalEntry::Action {
            from: self.peer_id.clone(),
            namespace: namespace.to_string(),
            action_id: action_id.to_string(),
            payload: String::from_utf8_lossy(&payload).into_owned(),
        });

        let event = TransportEvent::Action {
            namespace: namespace.to_string(),
            action_id: action_id.to_string(),
            payload,
            sender: self.peer_id.clone(),
        };
        for to in state.others(&self.peer_id) {
            if let Some(endpoint) = state.endpoints.get_mut(&to) {
                endpoint.deliver(&event);
            }
        }
        Ok(())
    }

    fn subscribe(&self, hook: PeerHookType, stream_kind: PeerStreamType) -> Result<Subscription> {
        let mut state = self.state.lock();
        let endpoint = state
            .endpoints
            .get_mut(&self.peer_id)
            .ok_or_else(|| self.not_connected())?;

        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let subscriber = Subscriber {
            id,
            stream_kind,
            sender: tx,
        };
        if !endpoint.attached {
            endpoint.attached = true;
            for event in endpoint.backlog.drain(..) {
                subscriber.offer(&event);
            }
        }
        let previous = endpoint.subscribers.insert(hook, subscriber);
        if previous.is_some() {
            warn!("Replacing {:?} subscription for {}", hook, self.peer_id);
        }

        let weak: Weak<Mutex<MeshState>> = Arc::downgrade(&self.state);
        let peer_id = self.peer_id.clone();
        Ok(Subscription::with_id(id, hook, rx, move || {
            if let Some(state) = weak.upgrade() {
                let mut state = state.lock();
                if let Some(endpoint) = state.endpoints.get_mut(&peer_id) {
                    if endpoint.subscribers.get(&hook).map(|s| s.id) == Some(id) {
                        endpoint.subscribers.remove(&hook);
                    }
                }
            }
        }))
    }
}
