use crate::types::{CameraState, Peer, PeerId};
use crate::utils::{Error, Result};
use parking_lot::RwLock;

/// Remote participants in join order, with the camera state each one last
/// announced.
#[derive(Debug, Default)]
pub struct PeerRoster {
    peers: RwLock<Vec<Peer>>,
}

impl PeerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the peer was not listed yet.
    pub fn upsert(&self, peer_id: &str) -> bool {
        let mut peers = self.peers.write();
        if peers.iter().any(|p| p.peer_id == peer_id) {
            return false;
        }
        peers.push(Peer::new(peer_id.to_string()));
        true
    }

    pub fn remove(&self, peer_id: &str) -> Option<Peer> {
        let mut peers = self.peers.write();
        let index = peers.iter().position(|p| p.peer_id == peer_id)?;
        Some(peers.remove(index))
    }

    /// Stores an announced state and returns the previous one.
    pub fn set_video_state(&self, peer_id: &PeerId, state: CameraState) -> Result<CameraState> {
        let mut peers = self.peers.write();
        let peer = peers
            .iter_mut()
            .find(|p| &p.peer_id == peer_id)
            .ok_or_else(|| Error::StaleAnnouncement(peer_id.clone()))?;
        Ok(std::mem::replace(&mut peer.video_state, state))
    }

    pub fn video_state(&self, peer_id: &str) -> Option<CameraState> {
        self.peers
            .read()
            .iter()
            .find(|p| p.peer_id == peer_id)
            .map(|p| p.video_state)
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.read().iter().any(|p| p.peer_id == peer_id)
    }

    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers.read().clone()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}
