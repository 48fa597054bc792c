pub mod memory;
pub mod subscription;

use crate::media::MediaStream;
use crate::types::{PeerId, StreamMetadata};
use crate::utils::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub use memory::{MemoryMesh, MemoryTransport};
pub use subscription::Subscription;

/// Which subsystem owns a subscription. Registering again under the same hook
/// replaces the earlier registration.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerHookType {
    Video,
    Audio,
    Screen,
    Chat,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerStreamType {
    Audio,
    Video,
}

#[derive(Clone)]
pub enum TransportEvent {
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    PeerStream {
        stream: Arc<MediaStream>,
        peer_id: PeerId,
        metadata: Value,
    },
    Action {
        namespace: String,
        action_id: String,
        payload: Bytes,
        sender: PeerId,
    },
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::PeerJoined(peer) => write!(f, "PeerJoined({})", peer),
            TransportEvent::PeerLeft(peer) => write!(f, "PeerLeft({})", peer),
            TransportEvent::PeerStream { stream, peer_id, metadata } => write!(
                f,
                "PeerStream({} from {}, {})",
                stream.id(),
                peer_id,
                metadata
            ),
            TransportEvent::Action { namespace, action_id, sender, payload } => write!(
                f,
                "Action({}/{} from {}, {} bytes)",
                namespace,
                action_id,
                sender,
                payload.len()
            ),
        }
    }
}

/// The mesh connection as seen by one participant.
///
/// Delivery is at-most-once and ordered per sender; nothing is ordered across
/// senders. Operations naming a peer that is not connected fail with
/// `Error::PublishTargetGone`.
#[async_trait]
pub trait MeshTransport: Send + Sync {
    fn self_id(&self) -> PeerId;

    fn get_peers(&self) -> Vec<PeerId>;

    /// `target: None` sends to every connected peer.
    async fn add_stream(
        &self,
        stream: &Arc<MediaStream>,
        target: Option<&PeerId>,
        metadata: &StreamMetadata,
    ) -> Result<()>;

    async fn remove_stream(&self, stream: &MediaStream, targets: &[PeerId]) -> Result<()>;

    /// Broadcasts a typed action to every connected peer.
    async fn send_action(&self, namespace: &str, action_id: &str, payload: Bytes) -> Result<()>;

    /// Membership and action events, plus inbound streams of `stream_kind`.
    fn subscribe(&self, hook: PeerHookType, stream_kind: PeerStreamType) -> Result<Subscription>;
}
