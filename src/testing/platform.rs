use super::journal::{Journal, JournalEntry};
use crate::media::{
    CaptureConstraints, MediaDeviceInfo, MediaDeviceKind, MediaKind, MediaPlatform, MediaStream,
    MediaTrack,
};
use crate::utils::{Error, Result};
use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Camera APIs backed by a configurable device list.
///
/// The raw list is served as-is, duplicates included. Acquisitions can be held
/// behind a gate to reproduce an intent change while a permission prompt is
/// still open.
#[derive(Default)]
pub struct FakeMediaPlatform {
    devices: Mutex<Vec<MediaDeviceInfo>>,
    deny_permission: AtomicBool,
    issued: Mutex<Vec<MediaTrack>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    pending: AtomicUsize,
    enumerations: AtomicUsize,
    stopped: AtomicUsize,
    overlapping: AtomicUsize,
    journal: Journal,
}

impl FakeMediaPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(ids: &[&str]) -> Self {
        let platform = Self::new();
        platform.set_devices(ids);
        platform
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn set_devices(&self, ids: &[&str]) {
        *self.devices.lock() = ids
            .iter()
            .map(|id| MediaDeviceInfo::video(id, &format!("Camera {}", id)))
            .collect();
    }

    pub fn set_raw_devices(&self, devices: Vec<MediaDeviceInfo>) {
        *self.devices.lock() = devices;
    }

    pub fn deny_permission(&self, deny: bool) {
        self.deny_permission.store(deny, Ordering::SeqCst);
    }

    /// Parks every following acquisition until `release_acquisitions`.
    pub fn hold_acquisitions(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_acquisitions(&self, count: usize) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.add_permits(count);
        }
    }

    /// Lets everything through again, including acquisitions already parked.
    pub fn open_gate(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(1024);
        }
    }

    pub fn pending_acquisitions(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    pub fn stopped_tracks(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Acquisitions that found the same device already capturing.
    pub fn overlapping_captures(&self) -> usize {
        self.overlapping.load(Ordering::SeqCst)
    }

    pub fn live_captures(&self, device_id: &str) -> usize {
        self.issued
            .lock()
            .iter()
            .filter(|t| t.is_live() && t.device_id().map(String::as_str) == Some(device_id))
            .count()
    }

    pub fn total_live_captures(&self) -> usize {
        self.issued.lock().iter().filter(|t| t.is_live()).count()
    }

    fn resolve_device(&self, requested: Option<&String>) -> Result<String> {
        let devices = self.devices.lock();
        let mut video = devices.iter().filter(|d| d.kind == MediaDeviceKind::VideoInput);
        let found = match requested {
            Some(id) => video.find(|d| &d.device_id == id),
            None => video.next(),
        };
        found
            .map(|d| d.device_id.clone())
            .ok_or_else(|| match requested {
                Some(id) => Error::DeviceUnavailable(format!("no camera with id {}", id)),
                None => Error::DeviceUnavailable("no camera connected".to_string()),
            })
    }
}

#[async_trait]
impl MediaPlatform for FakeMediaPlatform {
    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.lock().clone())
    }

    async fn get_user_media(&self, constraints: &CaptureConstraints) -> Result<MediaStream> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            self.pending.fetch_add(1, Ordering::SeqCst);
            let permit = gate.acquire().await;
            self.pending.fetch_sub(1, Ordering::SeqCst);
            match permit {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(Error::DeviceUnavailable("capture aborted".to_string())),
            }
        }

        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(Error::DeviceUnavailable("permission denied".to_string()));
        }
        if !constraints.video {
            return Err(Error::DeviceUnavailable("no video requested".to_string()));
        }

        let device_id = self.resolve_device(constraints.device_id.as_ref())?;
        if self.live_captures(&device_id) > 0 {
            warn!("Device {} acquired while already capturing", device_id);
            self.overlapping.fetch_add(1, Ordering::SeqCst);
        }

        let track = MediaTrack::new(MediaKind::Video, Some(device_id.clone()));
        self.issued.lock().push(track.clone());
        let stream = MediaStream::new(vec![track]);
        debug!("Fake capture on {} as {}", device_id, stream.id());
        self.journal.record(JournalEntry::Acquired {
            device_id,
            stream_id: stream.id().to_string(),
        });
        Ok(stream)
    }

    async fn stop_track(&self, track: &MediaTrack) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        self.journal.record(JournalEntry::Released {
            device_id: track.device_id().cloned(),
            track_id: track.id().to_string(),
        });
    }
}
