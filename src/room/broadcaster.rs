use super::registry::RemoteStreamRegistry;
use super::roster::PeerRoster;
use crate::metrics::VideoMetrics;
use crate::transport::MeshTransport;
use crate::types::{CameraState, PeerId};
use crate::utils::Result;
use bytes::Bytes;
use log::{debug, info};
use std::sync::Arc;

/// Outcome of applying a received announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reception {
    pub peer_id: PeerId,
    pub previous: CameraState,
    pub state: CameraState,
    pub evicted: bool,
}

/// Sends the local camera state to the room and applies the states other
/// peers send.
///
/// The receive path is the only writer of a roster entry's `video_state`. A
/// STOPPED announcement evicts the sender's stream right away, whether or not
/// the transport has torn the media down yet.
pub struct PeerStateBroadcaster {
    transport: Arc<dyn MeshTransport>,
    roster: Arc<PeerRoster>,
    registry: Arc<RemoteStreamRegistry>,
    namespace: String,
    action_id: String,
    metrics: Arc<VideoMetrics>,
}

impl PeerStateBroadcaster {
    pub fn new(
        transport: Arc<dyn MeshTransport>,
        roster: Arc<PeerRoster>,
        registry: Arc<RemoteStreamRegistry>,
        namespace: &str,
        action_id: &str,
        metrics: Arc<VideoMetrics>,
    ) -> Self {
        Self {
            transport,
            roster,
            registry,
            namespace: namespace.to_string(),
            action_id: action_id.to_string(),
            metrics,
        }
    }

    pub async fn announce(&self, state: CameraState) -> Result<()> {
        let payload = Bytes::from(serde_json::to_vec(&state)?);
        self.transport
            .send_action(&self.namespace, &self.action_id, payload)
            .await?;
        self.metrics.record_announcement_sent();
        info!("Announced camera {:?}", state);
        Ok(())
    }

    pub fn matches(&self, namespace: &str, action_id: &str) -> bool {
        namespace == self.namespace && action_id == self.action_id
    }

    pub fn decode(payload: &[u8]) -> Result<CameraState> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Applies `state` to `sender`'s roster entry. Fails with
    /// `StaleAnnouncement` if the sender is not in the roster.
    pub fn on_receive(&self, state: CameraState, sender: &PeerId) -> Result<Reception> {
        self.metrics.record_announcement_received();
        let previous = self.roster.set_video_state(sender, state)?;
        debug!("Peer {} camera {:?} -> {:?}", sender, previous, state);

        let evicted = match state {
            CameraState::Stopped => self.registry.evict(sender).is_some(),
            CameraState::Playing => false,
        };

        Ok(Reception {
            peer_id: sender.clone(),
            previous,
            state,
            evicted,
        })
    }
}
