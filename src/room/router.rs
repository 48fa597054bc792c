use crate::media::MediaStream;
use crate::metrics::VideoMetrics;
use crate::transport::MeshTransport;
use crate::types::{PeerId, StreamMetadata};
use log::{debug, warn};
use std::sync::Arc;

/// Fans the local webcam stream out to peers.
///
/// Keeps no membership of its own: every call works on the targets it is given
/// or on a `get_peers()` snapshot taken at call time.
pub struct StreamRouter {
    transport: Arc<dyn MeshTransport>,
    metrics: Arc<VideoMetrics>,
}

impl StreamRouter {
    pub fn new(transport: Arc<dyn MeshTransport>, metrics: Arc<VideoMetrics>) -> Self {
        Self { transport, metrics }
    }

    /// Adds `stream` for one peer, or for every connected peer when `peer_id`
    /// is `None`. Returns the peers that actually received it.
    pub async fn publish(&self, stream: &Arc<MediaStream>, peer_id: Option<&PeerId>) -> Vec<PeerId> {
        let targets = match peer_id {
            Some(peer) => vec![peer.clone()],
            None => self.transport.get_peers(),
        };
        let metadata = StreamMetadata::webcam();
        let mut delivered = Vec::with_capacity(targets.len());

        for peer in targets {
            match self.transport.add_stream(stream, Some(&peer), &metadata).await {
                Ok(()) => {
                    self.metrics.record_publish();
                    debug!("Published stream {} to {}", stream.id(), peer);
                    delivered.push(peer);
                }
                Err(e) if e.is_benign() => debug!("Skipped publish: {}", e),
                Err(e) => warn!("Failed to publish stream {} to {}: {}", stream.id(), peer, e),
            }
        }
        delivered
    }

    /// Withdraws `stream` from `targets`. Departed peers are skipped silently.
    pub async fn unpublish(&self, stream: &MediaStream, targets: &[PeerId]) {
        if targets.is_empty() {
            return;
        }
        match self.transport.remove_stream(stream, targets).await {
            Ok(()) => debug!("Unpublished stream {} from {:?}", stream.id(), targets),
            Err(e) if e.is_benign() => debug!("Partial unpublish of {}: {}", stream.id(), e),
            Err(e) => warn!("Failed to unpublish stream {}: {}", stream.id(), e),
        }
        for _ in targets {
            self.metrics.record_unpublish();
        }
    }
}
