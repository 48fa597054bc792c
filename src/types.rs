// src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type PeerId = String;
pub type DeviceId = String;

/// Camera state as announced to the rest of the room.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CameraState {
    Playing,
    Stopped,
}

impl Default for CameraState {
    fn default() -> Self {
        CameraState::Stopped
    }
}

/// Purpose tag carried by every stream on the shared transport.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    Webcam,
    ScreenShare,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    #[serde(rename = "type")]
    pub stream_type: StreamType,
}

impl StreamMetadata {
    pub fn webcam() -> Self {
        Self {
            stream_type: StreamType::Webcam,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "type": self.stream_type })
    }

    /// True when an untyped metadata record marks a webcam stream.
    ///
    /// Anything that is not an object with a `type` field equal to `"WEBCAM"`
    /// belongs to some other subsystem sharing the transport.
    pub fn is_webcam(metadata: &Value) -> bool {
        metadata
            .as_object()
            .and_then(|record| record.get("type"))
            .and_then(Value::as_str)
            == Some("WEBCAM")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct VideoDeviceDescriptor {
    pub device_id: DeviceId,
    pub label: String,
}

/// Roster entry for one remote participant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Peer {
    pub peer_id: PeerId,
    pub video_state: CameraState,
    pub joined_at: DateTime<Utc>,
}

impl Peer {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            video_state: CameraState::Stopped,
            joined_at: Utc::now(),
        }
    }
}
