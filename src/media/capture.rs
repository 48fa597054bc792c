use super::platform::{CaptureConstraints, MediaDeviceInfo, MediaDeviceKind, MediaPlatform};
use super::stream::MediaStream;
use crate::metrics::VideoMetrics;
use crate::types::{DeviceId, VideoDeviceDescriptor};
use crate::utils::{Error, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// The live local camera stream. Only the `CaptureManager` owns one; everyone
/// else gets the `Arc<MediaStream>` inside it by reference.
#[derive(Debug)]
pub struct LocalCaptureHandle {
    stream: Arc<MediaStream>,
    device_id: Option<DeviceId>,
}

impl LocalCaptureHandle {
    pub fn stream(&self) -> &Arc<MediaStream> {
        &self.stream
    }

    pub fn device_id(&self) -> Option<&DeviceId> {
        self.device_id.as_ref()
    }
}

/// Filters a raw platform listing down to video inputs, one entry per id.
///
/// An id keeps the position where it was first seen; a later duplicate
/// replaces its descriptor.
pub fn dedupe_video_devices(raw: Vec<MediaDeviceInfo>) -> Vec<VideoDeviceDescriptor> {
    let mut devices: Vec<VideoDeviceDescriptor> = Vec::new();
    let mut positions: HashMap<DeviceId, usize> = HashMap::new();

    for info in raw.into_iter().filter(|d| d.kind == MediaDeviceKind::VideoInput) {
        let descriptor = VideoDeviceDescriptor {
            device_id: info.device_id,
            label: info.label,
        };
        match positions.get(&descriptor.device_id) {
            Some(&index) => devices[index] = descriptor,
            None => {
                positions.insert(descriptor.device_id.clone(), devices.len());
                devices.push(descriptor);
            }
        }
    }

    devices
}

pub struct CaptureManager {
    platform: Arc<dyn MediaPlatform>,
    active: Option<LocalCaptureHandle>,
    metrics: Arc<VideoMetrics>,
}

impl CaptureManager {
    pub fn new(platform: Arc<dyn MediaPlatform>, metrics: Arc<VideoMetrics>) -> Self {
        Self {
            platform,
            active: None,
            metrics,
        }
    }

    pub async fn enumerate_devices(&self) -> Result<Vec<VideoDeviceDescriptor>> {
        let raw = self.platform.enumerate_devices().await?;
        let raw_count = raw.len();
        let devices = dedupe_video_devices(raw);
        debug!(
            "Enumerated {} video devices ({} raw entries)",
            devices.len(),
            raw_count
        );
        Ok(devices)
    }

    /// Requests a video-only capture. Every failure comes back as
    /// `DeviceUnavailable`.
    pub async fn acquire(&self, device_id: Option<DeviceId>) -> Result<LocalCaptureHandle> {
        let constraints = CaptureConstraints::video_only(device_id.clone());

        let stream = match self.platform.get_user_media(&constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                self.metrics.record_acquisition_failure();
                warn!("Camera acquisition failed for {:?}: {}", device_id, e);
                return Err(match e {
                    Error::DeviceUnavailable(reason) => Error::DeviceUnavailable(reason),
                    other => Error::DeviceUnavailable(other.to_string()),
                });
            }
        };

        if !stream.has_video() {
            self.release(&stream).await;
            self.metrics.record_acquisition_failure();
            return Err(Error::DeviceUnavailable(
                "capture returned no video track".to_string(),
            ));
        }

        let device_id = device_id.or_else(|| {
            stream
                .video_tracks()
                .first()
                .and_then(|t| t.device_id().cloned())
        });

        self.metrics.record_acquisition();
        info!("Acquired camera {:?} as stream {}", device_id, stream.id());
        Ok(LocalCaptureHandle {
            stream: Arc::new(stream),
            device_id,
        })
    }

    /// Stops and detaches every track. Already stopped tracks are skipped.
    pub async fn release(&self, stream: &MediaStream) {
        for track in stream.tracks() {
            if track.stop() {
                self.platform.stop_track(&track).await;
            }
            stream.remove_track(track.id());
        }
        debug!("Released stream {}", stream.id());
    }

    pub fn active(&self) -> Option<&LocalCaptureHandle> {
        self.active.as_ref()
    }

    pub fn set_active(&mut self, handle: LocalCaptureHandle) {
        if let Some(previous) = self.active.replace(handle) {
            warn!(
                "Replaced active capture {} without releasing it",
                previous.stream.id()
            );
        }
    }

    pub fn take_active(&mut self) -> Option<LocalCaptureHandle> {
        self.active.take()
    }
}
