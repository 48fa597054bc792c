use super::stream::{MediaStream, MediaTrack};
use crate::types::DeviceId;
use crate::utils::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum MediaDeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

/// Raw device entry as reported by the platform, duplicates included.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub device_id: DeviceId,
    pub label: String,
    pub kind: MediaDeviceKind,
}

impl MediaDeviceInfo {
    pub fn video(device_id: &str, label: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            label: label.to_string(),
            kind: MediaDeviceKind::VideoInput,
        }
    }
}

/// Constraints for a capture request. `device_id: None` means platform default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub audio: bool,
    pub video: bool,
    pub device_id: Option<DeviceId>,
}

impl CaptureConstraints {
    pub fn video_only(device_id: Option<DeviceId>) -> Self {
        Self {
            audio: false,
            video: true,
            device_id,
        }
    }
}

/// Platform media APIs. Every call may suspend on a permission prompt or the
/// device driver.
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>>;

    /// Fails with `Error::DeviceUnavailable` when permission is denied or no
    /// device matches.
    async fn get_user_media(&self, constraints: &CaptureConstraints) -> Result<MediaStream>;

    /// Hands the hardware behind `track` back to the platform.
    async fn stop_track(&self, track: &MediaTrack);
}
