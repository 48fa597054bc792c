use crate::media::MediaStream;
use crate::metrics::VideoMetrics;
use crate::types::{PeerId, StreamMetadata};
use log::{debug, info};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Inbound webcam streams keyed by sending peer. A cache over transport
/// events; it never talks to the network.
pub struct RemoteStreamRegistry {
    streams: RwLock<HashMap<PeerId, Arc<MediaStream>>>,
    metrics: Arc<VideoMetrics>,
}

impl RemoteStreamRegistry {
    pub fn new(metrics: Arc<VideoMetrics>) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Records `stream` as `peer_id`'s webcam, replacing any earlier one.
    /// Streams tagged for another purpose are ignored and `false` is returned.
    pub fn on_inbound_stream(&self, stream: Arc<MediaStream>, peer_id: &PeerId, metadata: &Value) -> bool {
        if !StreamMetadata::is_webcam(metadata) {
            debug!("Ignoring non-webcam stream {} from {}", stream.id(), peer_id);
            return false;
        }

        let stream_id = stream.id().to_string();
        if let Some(previous) = self.streams.write().insert(peer_id.clone(), stream) {
            debug!("Replaced stream {} from {}", previous.id(), peer_id);
        }
        info!("Registered webcam stream {} from {}", stream_id, peer_id);
        true
    }

    pub fn evict(&self, peer_id: &PeerId) -> Option<Arc<MediaStream>> {
        let evicted = self.streams.write().remove(peer_id);
        if evicted.is_some() {
            self.metrics.record_eviction();
            info!("Evicted webcam stream from {}", peer_id);
        }
        evicted
    }

    /// Empties the registry, returning the peers that had an entry.
    pub fn clear(&self) -> Vec<PeerId> {
        let drained: Vec<PeerId> = self.streams.write().drain().map(|(peer, _)| peer).collect();
        for _ in &drained {
            self.metrics.record_eviction();
        }
        drained
    }

    pub fn get(&self, peer_id: &str) -> Option<Arc<MediaStream>> {
        self.streams.read().get(peer_id).cloned()
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.streams.read().contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }

    pub fn snapshot(&self) -> HashMap<PeerId, Arc<MediaStream>> {
        self.streams.read().clone()
    }
}
