use super::broadcaster::PeerStateBroadcaster;
use super::lifecycle::{self, LocalCamera};
use super::registry::RemoteStreamRegistry;
use super::roster::PeerRoster;
use super::router::StreamRouter;
use crate::config::CoordinatorConfig;
use crate::media::{CameraStateMachine, CaptureManager, LocalCameraState, MediaPlatform, MediaStream, StateTransition};
use crate::metrics::{VideoMetrics, VideoMetricsSnapshot};
use crate::transport::{MeshTransport, PeerHookType, PeerStreamType};
use crate::types::{CameraState, DeviceId, Peer, PeerId, VideoDeviceDescriptor};
use crate::utils::{Error, Result};
use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

/// Notifications for the UI layer.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    CameraStateChanged(StateTransition),
    Announced(CameraState),
    CaptureFailed(String),
    DevicesChanged(Vec<VideoDeviceDescriptor>),
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    PeerVideoStateChanged { peer_id: PeerId, state: CameraState },
    RemoteStreamAdded(PeerId),
    RemoteStreamRemoved(PeerId),
}

/// What the local user asked for. Not the same as what the camera is doing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct Intent {
    pub camera_enabled: bool,
    pub selected_device: Option<DeviceId>,
}

pub(super) struct Pump {
    pub stop: oneshot::Sender<()>,
    pub handle: JoinHandle<()>,
}

pub(super) struct Shared {
    pub config: CoordinatorConfig,
    pub self_id: PeerId,
    pub transport: Arc<dyn MeshTransport>,
    // Single owner of the local camera; every transition holds this lock.
    pub camera: tokio::sync::Mutex<LocalCamera>,
    pub intent: Mutex<Intent>,
    pub devices: RwLock<Vec<VideoDeviceDescriptor>>,
    pub self_stream: RwLock<Option<Arc<MediaStream>>>,
    pub announced: Mutex<CameraState>,
    pub last_error: Mutex<Option<String>>,
    pub states: CameraStateMachine,
    pub router: StreamRouter,
    pub broadcaster: PeerStateBroadcaster,
    pub registry: Arc<RemoteStreamRegistry>,
    pub roster: Arc<PeerRoster>,
    pub metrics: Arc<VideoMetrics>,
    pub events: broadcast::Sender<CoordinatorEvent>,
    pub closed: AtomicBool,
    pub pump: Mutex<Option<Pump>>,
}

impl Shared {
    pub fn emit(&self, event: CoordinatorEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Coordinates the local camera and the room's webcam streams for one
/// participant in one room session.
///
/// Cheap to clone; all clones drive the same session. Intent setters return
/// once the camera has settled on the latest intent.
#[derive(Clone)]
pub struct VideoCoordinator {
    shared: Arc<Shared>,
}

impl VideoCoordinator {
    /// Subscribes to the transport and starts processing room events. Must be
    /// called from within a tokio runtime.
    pub fn start(
        config: CoordinatorConfig,
        transport: Arc<dyn MeshTransport>,
        platform: Arc<dyn MediaPlatform>,
    ) -> Result<Self> {
        let metrics = Arc::new(VideoMetrics::new());
        let roster = Arc::new(PeerRoster::new());
        let registry = Arc::new(RemoteStreamRegistry::new(metrics.clone()));

        // Subscribe before taking the snapshot so no join falls in between.
        let subscription = transport.subscribe(PeerHookType::Video, PeerStreamType::Video)?;
        for peer in transport.get_peers() {
            roster.upsert(&peer);
        }

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let broadcaster = PeerStateBroadcaster::new(
            transport.clone(),
            roster.clone(),
            registry.clone(),
            &config.action_namespace,
            &config.action_id,
            metrics.clone(),
        );

        let shared = Arc::new(Shared {
            self_id: transport.self_id(),
            router: StreamRouter::new(transport.clone(), metrics.clone()),
            camera: tokio::sync::Mutex::new(LocalCamera {
                capture: CaptureManager::new(platform, metrics.clone()),
                published: HashSet::new(),
                enumerated: false,
            }),
            intent: Mutex::new(Intent::default()),
            devices: RwLock::new(Vec::new()),
            self_stream: RwLock::new(None),
            announced: Mutex::new(CameraState::Stopped),
            last_error: Mutex::new(None),
            states: CameraStateMachine::new(),
            broadcaster,
            registry,
            roster,
            metrics,
            events,
            closed: AtomicBool::new(false),
            pump: Mutex::new(None),
            transport,
            config,
        });

        let (stop, stop_rx) = oneshot::channel();
        let handle = lifecycle::spawn_pump(Arc::downgrade(&shared), subscription, stop_rx);
        *shared.pump.lock() = Some(Pump { stop, handle });

        info!(
            "Video coordinator started for {} with {} peers",
            shared.self_id,
            shared.roster.len()
        );
        Ok(Self { shared })
    }

    pub fn self_id(&self) -> &PeerId {
        &self.shared.self_id
    }

    pub fn camera_enabled(&self) -> bool {
        self.shared.intent.lock().camera_enabled
    }

    /// Expresses intent; the camera follows asynchronously. Returns the
    /// capture error if this call's transition could not acquire a camera.
    pub async fn set_camera_enabled(&self, enabled: bool) -> Result<()> {
        if self.shared.is_closed() {
            return Err(Error::Closed);
        }
        self.shared.intent.lock().camera_enabled = enabled;
        self.shared.reconcile().await
    }

    pub fn selected_device(&self) -> Option<DeviceId> {
        self.shared.intent.lock().selected_device.clone()
    }

    /// Picks the camera to use. Switches immediately when the camera is on.
    pub async fn select_device(&self, device_id: &str) -> Result<()> {
        if self.shared.is_closed() {
            return Err(Error::Closed);
        }
        self.shared.intent.lock().selected_device = Some(device_id.to_string());
        self.shared.reconcile().await
    }

    pub async fn refresh_devices(&self) -> Result<Vec<VideoDeviceDescriptor>> {
        if self.shared.is_closed() {
            return Err(Error::Closed);
        }
        let mut camera = self.shared.camera.lock().await;
        self.shared.enumerate(&mut camera).await
    }

    pub fn video_devices(&self) -> Vec<VideoDeviceDescriptor> {
        self.shared.devices.read().clone()
    }

    pub fn peer_video_streams(&self) -> HashMap<PeerId, Arc<MediaStream>> {
        self.shared.registry.snapshot()
    }

    pub fn self_video_stream(&self) -> Option<Arc<MediaStream>> {
        self.shared.self_stream.read().clone()
    }

    pub fn camera_state(&self) -> LocalCameraState {
        self.shared.states.current()
    }

    pub fn camera_history(&self) -> Vec<StateTransition> {
        self.shared.states.history()
    }

    pub fn announced_state(&self) -> CameraState {
        *self.shared.announced.lock()
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.shared.roster.snapshot()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.shared.events.subscribe()
    }

    pub fn metrics(&self) -> VideoMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Leaves the room: releases the camera (unpublish, release, STOPPED),
    /// clears every remote stream and drops the transport subscription.
    /// Calling it again does nothing.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        // Any acquisition still in flight is discarded when it resolves.
        shared.intent.lock().camera_enabled = false;

        {
            let mut camera = shared.camera.lock().await;
            if shared.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            if camera.capture.active().is_some() {
                if let Err(e) = shared.stop_camera(&mut camera).await {
                    warn!("Camera teardown ended in an unexpected state: {}", e);
                }
            }
            for peer_id in shared.registry.clear() {
                shared.emit(CoordinatorEvent::RemoteStreamRemoved(peer_id));
            }
            *shared.self_stream.write() = None;
        }

        let pump = shared.pump.lock().take();
        if let Some(Pump { stop, handle }) = pump {
            let _ = stop.send(());
            if let Err(e) = handle.await {
                warn!("Video event task ended abnormally: {}", e);
            }
        }
        info!("Video coordinator for {} shut down", shared.self_id);
    }
}
