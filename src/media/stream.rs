use crate::types::DeviceId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

/// One capture track. Clones share the same live flag, so stopping any clone
/// stops them all.
#[derive(Clone)]
pub struct MediaTrack {
    id: String,
    kind: MediaKind,
    device_id: Option<DeviceId>,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(kind: MediaKind, device_id: Option<DeviceId>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            device_id,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn device_id(&self) -> Option<&DeviceId> {
        self.device_id.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Returns true only for the call that actually ended the track.
    pub fn stop(&self) -> bool {
        self.live.swap(false, Ordering::SeqCst)
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("device_id", &self.device_id)
            .field("live", &self.is_live())
            .finish()
    }
}

/// A bundle of tracks moved as one unit over the transport.
pub struct MediaStream {
    id: String,
    tracks: Mutex<Vec<MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks: Mutex::new(tracks),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> Vec<MediaTrack> {
        self.tracks.lock().clone()
    }

    pub fn video_tracks(&self) -> Vec<MediaTrack> {
        self.tracks
            .lock()
            .iter()
            .filter(|track| track.kind() == MediaKind::Video)
            .cloned()
            .collect()
    }

    pub fn has_video(&self) -> bool {
        self.tracks.lock().iter().any(|t| t.kind() == MediaKind::Video)
    }

    /// A stream is active while it still holds a live track.
    pub fn is_active(&self) -> bool {
        self.tracks.lock().iter().any(MediaTrack::is_live)
    }

    pub fn remove_track(&self, track_id: &str) -> Option<MediaTrack> {
        let mut tracks = self.tracks.lock();
        let index = tracks.iter().position(|t| t.id() == track_id)?;
        Some(tracks.remove(index))
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.lock().len())
            .finish()
    }
}

impl PartialEq for MediaStream {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
